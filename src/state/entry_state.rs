/// Frontier entry state definitions
///
/// Every URL the crawler learns about is in exactly one of these states.
use std::fmt;

/// Why a dequeued URL was not processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The page is deeper than the configured maximum depth
    DepthExceeded,

    /// The page budget was exhausted before the page was admitted
    PageBudgetReached,

    /// The run was interrupted before the page was admitted
    Interrupted,
}

impl SkipReason {
    /// Short label used in logs and snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepthExceeded => "depth_exceeded",
            Self::PageBudgetReached => "page_budget_reached",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the state of a URL in the crawl frontier
///
/// Transitions are one-way: `Queued -> Visited` or `Queued -> Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Discovered and waiting in the queue
    Queued,

    /// Dequeued and handed to a worker (fetch may still fail)
    Visited,

    /// Dequeued but deliberately not processed
    Skipped(SkipReason),
}

impl EntryState {
    /// Returns true if the entry is still waiting in the queue
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }

    /// Returns true if the entry has left the queue, one way or another
    pub fn is_terminal(&self) -> bool {
        !self.is_queued()
    }

    /// Returns true if the entry was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("queued"),
            Self::Visited => f.write_str("visited"),
            Self::Skipped(reason) => write!(f, "skipped({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!EntryState::Queued.is_terminal());
        assert!(EntryState::Visited.is_terminal());
        assert!(EntryState::Skipped(SkipReason::DepthExceeded).is_terminal());
    }

    #[test]
    fn test_is_skipped() {
        assert!(EntryState::Skipped(SkipReason::Interrupted).is_skipped());
        assert!(!EntryState::Visited.is_skipped());
        assert!(!EntryState::Queued.is_skipped());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", EntryState::Queued), "queued");
        assert_eq!(format!("{}", EntryState::Visited), "visited");
        assert_eq!(
            format!("{}", EntryState::Skipped(SkipReason::DepthExceeded)),
            "skipped(depth_exceeded)"
        );
    }
}
