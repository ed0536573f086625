//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `EntryState`: Tracks the state of each URL known to the frontier (queued, visited, skipped)
//! - `SkipReason`: Why a dequeued URL was not processed

mod entry_state;

// Re-export main types
pub use entry_state::{EntryState, SkipReason};
