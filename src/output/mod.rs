//! Output module: merging rendered pages and reporting the run
//!
//! This module handles:
//! - Ordering rendered documents deterministically
//! - Driving the merge collaborator
//! - Summarizing run results on the console

mod assembler;
mod merge;
pub mod stats;

pub use assembler::{merge_order, Assembler, MergeReport};
pub use merge::{CommandMerger, MergeError, Merger};
pub use stats::{print_result, print_summary, RunMode, RunResult, RunSummary};
