//! Run orchestration
//!
//! A run has one of two front ends feeding the same back end:
//! - web mode crawls a site into the workspace ([`run_web`])
//! - local mode walks a directory of saved pages ([`run_local`])
//!
//! Both hand their pages to the render pipeline, print a summary and merge
//! the rendered documents. Logs and snapshots are exported for inspection on
//! every exit path once the workspace exists.

mod context;
mod local;
mod web;

pub use context::RunContext;
pub use local::{discover_html, run_local};
pub use web::run_web;

use crate::output::{print_result, print_summary, Assembler, RunMode, RunResult, RunSummary};
use crate::render::{RenderJob, RenderPipeline};
use crate::SiteBookError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Renders `jobs`, reports the counts and merges what rendered
///
/// An interrupted run prints its summary but never merges.
async fn render_and_merge(
    ctx: &RunContext,
    mode: RunMode,
    mut summary: RunSummary,
    jobs: Vec<RenderJob>,
    output: &Path,
) -> Result<RunResult, SiteBookError> {
    let pipeline = RenderPipeline::new(ctx.renderer(), ctx.config.render.clone())
        .with_logs(ctx.logs())
        .with_interrupt(Arc::clone(&ctx.interrupted));

    let batch = pipeline.render_all(jobs).await;

    summary.rendered_ok = batch.rendered.len();
    summary.rendered_failed = batch.failures.len() + batch.not_started;
    print_summary(mode, &summary);

    if ctx.is_interrupted() {
        tracing::warn!(
            "Run interrupted after rendering {} pages, skipping merge",
            summary.rendered_ok
        );
        return Err(SiteBookError::Interrupted);
    }

    let rendered: Vec<PathBuf> = batch.rendered.into_iter().map(|a| a.output).collect();
    let report = Assembler::new(ctx.merger(), ctx.logs())
        .assemble(&rendered, summary.rendered_failed, output)
        .await?;

    let result = RunResult::new(mode, summary, report.merged, report.output);
    print_result(&result);
    Ok(result)
}
