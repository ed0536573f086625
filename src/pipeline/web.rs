use super::{render_and_merge, RunContext};
use crate::crawler::{
    build_http_client, AssetLocalizer, Coordinator, FetchChain, Frontier, FrontierSnapshots,
    HttpFetcher, SavedPage,
};
use crate::output::{RunMode, RunResult, RunSummary};
use crate::render::RenderJob;
use crate::url::CanonicalUrl;
use crate::workspace::{AppendFile, LogKind};
use crate::SiteBookError;
use std::path::Path;
use std::sync::Arc;

/// Crawls the site at `seed`, renders every saved page and merges the result
///
/// # Errors
///
/// * `UrlError` - `seed` is not an absolute http(s) URL
/// * `NoInputFound` - no page could be fetched
/// * `NoSuccessfulRenders` / `MergeFailed` - see [`crate::output::Assembler`]
/// * `Interrupted` - Ctrl-C arrived before the merge
pub async fn run_web(
    ctx: &RunContext,
    seed: &str,
    output: &Path,
) -> Result<RunResult, SiteBookError> {
    let result = crawl_and_render(ctx, seed, output).await;
    ctx.export_debug();
    result
}

async fn crawl_and_render(
    ctx: &RunContext,
    seed: &str,
    output: &Path,
) -> Result<RunResult, SiteBookError> {
    let seed = CanonicalUrl::parse(seed)?;
    ctx.record_header("web", seed.as_str(), output);

    let config = &ctx.config;
    let workspace = ctx.workspace();
    let logs = ctx.logs();

    let client = build_http_client(&config.fetch)?;
    let http = HttpFetcher::new(client.clone(), &config.fetch);
    let fetcher =
        FetchChain::standard(http, ctx.browser(), &config.browser).with_logs(Arc::clone(&logs));

    let frontier = Frontier::with_snapshots(FrontierSnapshots {
        queue: AppendFile::open(&workspace.queue_snapshot(), false)?,
        visited: AppendFile::open(&workspace.visited_snapshot(), false)?,
    });

    let mut coordinator = Coordinator::new(
        seed.clone(),
        config.crawler.clone(),
        workspace.pages_dir(),
        fetcher,
        Arc::clone(&logs),
    )
    .with_frontier(frontier)
    .with_interrupt(Arc::clone(&ctx.interrupted));

    if config.assets.enabled {
        coordinator = coordinator.with_assets(AssetLocalizer::new(client, config.assets.clone()));
    }

    let report = coordinator.run().await;

    if report.pages.is_empty() {
        if report.interrupted {
            return Err(SiteBookError::Interrupted);
        }
        return Err(SiteBookError::NoInputFound {
            reason: format!(
                "no page of {} could be fetched ({} failed, see {})",
                seed,
                report.failed,
                logs.path(LogKind::Crawl).display()
            ),
        });
    }

    let jobs = report
        .pages
        .iter()
        .map(|page| render_job(page, &workspace.pages_dir(), &workspace.rendered_dir()))
        .collect();

    let summary = RunSummary {
        pages_crawled: report.pages.len(),
        pages_failed: report.failed,
        pages_skipped: report.skipped,
        ..Default::default()
    };

    render_and_merge(ctx, RunMode::Web, summary, jobs, output).await
}

/// Saved pages render against the pages directory, where their links and
/// asset folders resolve
fn render_job(page: &SavedPage, pages_dir: &Path, rendered_dir: &Path) -> RenderJob {
    let stem = page
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    RenderJob {
        html: page.path.clone(),
        base_dir: pages_dir.to_path_buf(),
        output: rendered_dir.join(format!("{}.pdf", stem)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_job_keeps_page_stem() {
        let page = SavedPage {
            url: CanonicalUrl::parse("https://ex.com/guide/intro").unwrap(),
            path: PathBuf::from("/w/pages/guide_intro.html"),
            depth: 2,
            title: None,
        };

        let job = render_job(&page, Path::new("/w/pages"), Path::new("/w/rendered"));

        assert_eq!(job.base_dir, PathBuf::from("/w/pages"));
        assert_eq!(job.output, PathBuf::from("/w/rendered/guide_intro.pdf"));
    }
}
