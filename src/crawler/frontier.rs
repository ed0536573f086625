//! Breadth-first crawl frontier
//!
//! This module owns crawl order and dedup:
//! - A FIFO queue of discovered URLs with their relative depth
//! - The state of every URL ever seen (queued, visited or skipped)
//! - Optional queue/visited snapshots written as the crawl progresses
//!
//! The frontier is plain data. The coordinator wraps it in a mutex and is the
//! only writer.

use crate::state::{EntryState, SkipReason};
use crate::url::CanonicalUrl;
use crate::workspace::AppendFile;
use std::collections::{HashMap, VecDeque};

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// The canonical URL to fetch
    pub url: CanonicalUrl,

    /// Depth relative to the seed
    pub depth: u32,
}

/// Snapshot files mirroring the frontier
#[derive(Debug)]
pub struct FrontierSnapshots {
    pub queue: AppendFile,
    pub visited: AppendFile,
}

/// BFS queue plus the state of every known URL
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    states: HashMap<CanonicalUrl, EntryState>,
    snapshots: Option<FrontierSnapshots>,
}

impl Frontier {
    /// Creates an empty frontier without snapshots
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty frontier that mirrors enqueues and visits to files
    pub fn with_snapshots(snapshots: FrontierSnapshots) -> Self {
        Self {
            snapshots: Some(snapshots),
            ..Self::default()
        }
    }

    /// Adds a URL to the tail of the queue
    ///
    /// # Returns
    ///
    /// * `true` - The URL was new and is now queued
    /// * `false` - The URL is already known in some state; nothing changed
    pub fn enqueue(&mut self, url: CanonicalUrl, depth: u32) -> bool {
        if self.states.contains_key(&url) {
            return false;
        }

        if let Some(snapshots) = &self.snapshots {
            snapshots.queue.record(url.as_str());
        }

        tracing::trace!("Enqueued {} at depth {}", url, depth);
        self.states.insert(url.clone(), EntryState::Queued);
        self.queue.push_back(FrontierEntry { url, depth });
        true
    }

    /// Pops the oldest entry that is still queued
    pub fn dequeue_next(&mut self) -> Option<FrontierEntry> {
        while let Some(entry) = self.queue.pop_front() {
            if self.state(&entry.url) == Some(EntryState::Queued) {
                return Some(entry);
            }
        }
        None
    }

    /// Marks a URL as visited
    ///
    /// Must be called before acting on a dequeued URL.
    ///
    /// # Returns
    ///
    /// * `true` - The URL moved to `Visited`
    /// * `false` - The URL was already visited or skipped
    pub fn mark_visited(&mut self, url: &CanonicalUrl) -> bool {
        match self.states.get(url) {
            Some(state) if state.is_terminal() => return false,
            _ => {}
        }

        if let Some(snapshots) = &self.snapshots {
            snapshots.visited.record(url.as_str());
        }

        self.states.insert(url.clone(), EntryState::Visited);
        true
    }

    /// Marks a URL as skipped
    ///
    /// Visited URLs stay visited.
    pub fn mark_skipped(&mut self, url: &CanonicalUrl, reason: SkipReason) {
        if self.state(url) == Some(EntryState::Visited) {
            return;
        }
        tracing::debug!("Skipping {} ({})", url, reason);
        self.states.insert(url.clone(), EntryState::Skipped(reason));
    }

    /// Marks every still-queued entry as skipped and empties the queue
    ///
    /// # Returns
    ///
    /// The number of entries drained
    pub fn drain_skipped(&mut self, reason: SkipReason) -> usize {
        let mut drained = 0;
        while let Some(entry) = self.dequeue_next() {
            self.mark_skipped(&entry.url, reason);
            drained += 1;
        }
        drained
    }

    /// Current state of a URL, if known
    pub fn state(&self, url: &CanonicalUrl) -> Option<EntryState> {
        self.states.get(url).copied()
    }

    /// Returns true if the URL has been seen in any state
    pub fn contains(&self, url: &CanonicalUrl) -> bool {
        self.states.contains_key(url)
    }

    /// Number of entries waiting in the queue
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if no entry is waiting
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of URLs in a skipped state
    pub fn skipped_count(&self) -> usize {
        self.states.values().filter(|s| s.is_skipped()).count()
    }

    /// Number of URLs marked visited
    pub fn visited_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| **s == EntryState::Visited)
            .count()
    }
}
