//! Run result and console summaries

use std::fmt;
use std::path::PathBuf;

/// Which front end produced a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Web,
    Local,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Web => write!(f, "web"),
            RunMode::Local => write!(f, "local"),
        }
    }
}

/// Counts gathered before the merge step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub pages_skipped: usize,
    pub rendered_ok: usize,
    pub rendered_failed: usize,
}

/// Final outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub mode: RunMode,

    /// Pages fetched and saved (web) or HTML files found (local)
    pub pages_crawled: usize,

    /// Pages whose fetch failed
    pub pages_failed: usize,

    /// URLs left unfetched because of depth, budget or interruption
    pub pages_skipped: usize,

    pub rendered_ok: usize,
    pub rendered_failed: usize,

    /// Documents merged into the output
    pub merged: usize,

    /// Pages excluded from the output
    pub excluded: usize,

    pub output: PathBuf,
}

impl RunResult {
    pub fn new(mode: RunMode, summary: RunSummary, merged: usize, output: PathBuf) -> Self {
        Self {
            mode,
            pages_crawled: summary.pages_crawled,
            pages_failed: summary.pages_failed,
            pages_skipped: summary.pages_skipped,
            rendered_ok: summary.rendered_ok,
            rendered_failed: summary.rendered_failed,
            merged,
            excluded: summary.rendered_failed,
            output,
        }
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints the pre-merge summary to stdout
pub fn print_summary(mode: RunMode, summary: &RunSummary) {
    println!("=== Run Summary ({}) ===\n", mode);

    if mode == RunMode::Web {
        println!("Crawl:");
        println!("  Pages saved: {}", summary.pages_crawled);
        println!("  Pages failed: {}", summary.pages_failed);
        println!("  Pages skipped: {}", summary.pages_skipped);
        println!();
    } else {
        println!("Input:");
        println!("  HTML files found: {}", summary.pages_crawled);
        println!();
    }

    let attempted = summary.rendered_ok + summary.rendered_failed;
    println!("Render:");
    println!(
        "  Rendered: {} ({:.1}%)",
        summary.rendered_ok,
        percentage(summary.rendered_ok, attempted)
    );
    println!("  Failed: {}", summary.rendered_failed);
    println!();
}

/// Prints the final run result to stdout
pub fn print_result(result: &RunResult) {
    println!("=== Result ===\n");
    println!("  Output: {}", result.output.display());
    println!("  Documents merged: {}", result.merged);
    if result.excluded > 0 {
        println!("  Pages excluded: {}", result.excluded);
    }
}
