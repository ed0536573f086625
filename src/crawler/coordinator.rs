//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop, which:
//! - Seeds the frontier and admits work while the page budget allows
//! - Skips entries deeper than the configured maximum depth
//! - Runs fetch, link rewriting and asset localization on a bounded worker set
//! - Feeds discovered in-scope links back into the frontier
//! - Stops admitting work once the run is interrupted

use crate::config::CrawlerConfig;
use crate::crawler::assets::AssetLocalizer;
use crate::crawler::fetcher::{FetchChain, FetchError};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::parser::extract_title;
use crate::crawler::rewriter::rewrite_links;
use crate::state::SkipReason;
use crate::url::{relative_depth, to_local_path, CanonicalUrl};
use crate::workspace::{LogKind, RunLogs};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Pages between two progress lines
const PROGRESS_INTERVAL: usize = 10;

/// A page saved to the workspace
#[derive(Debug, Clone)]
pub struct SavedPage {
    /// Canonical URL the page was crawled as
    pub url: CanonicalUrl,

    /// Saved HTML file
    pub path: PathBuf,

    /// Depth relative to the seed
    pub depth: u32,

    /// Page title, if any
    pub title: Option<String>,
}

/// Summary of a finished crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Pages fetched and saved, in completion order
    pub pages: Vec<SavedPage>,

    /// Pages whose fetch or save failed
    pub failed: usize,

    /// URLs dequeued or drained without being fetched
    pub skipped: usize,

    /// Distinct URLs the frontier learned about
    pub discovered: usize,

    /// True if the crawl stopped because of an interruption
    pub interrupted: bool,
}

/// Errors that end the processing of one page
#[derive(Debug, Error)]
enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a page task needs, shared by all tasks
struct PageWorker {
    seed: CanonicalUrl,
    pages_dir: PathBuf,
    fetcher: FetchChain,
    assets: Option<AssetLocalizer>,
    frontier: Arc<Mutex<Frontier>>,
}

struct PageOutcome {
    url: CanonicalUrl,
    result: Result<SavedPage, PageError>,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    seed: CanonicalUrl,
    config: CrawlerConfig,
    pages_dir: PathBuf,
    fetcher: FetchChain,
    assets: Option<AssetLocalizer>,
    logs: Arc<RunLogs>,
    frontier: Arc<Mutex<Frontier>>,
    interrupted: Arc<AtomicBool>,
}

impl Coordinator {
    /// Creates a coordinator that saves pages into `pages_dir`
    pub fn new(
        seed: CanonicalUrl,
        config: CrawlerConfig,
        pages_dir: PathBuf,
        fetcher: FetchChain,
        logs: Arc<RunLogs>,
    ) -> Self {
        Self {
            seed,
            config,
            pages_dir,
            fetcher,
            assets: None,
            logs,
            frontier: Arc::new(Mutex::new(Frontier::new())),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Localizes page assets after rewriting
    pub fn with_assets(mut self, assets: AssetLocalizer) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Uses a prepared frontier (for example one with snapshots)
    pub fn with_frontier(mut self, frontier: Frontier) -> Self {
        self.frontier = Arc::new(Mutex::new(frontier));
        self
    }

    /// Shares an interruption flag; once set, no new page is admitted
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// The frontier, for inspection after the crawl
    pub fn frontier(&self) -> Arc<Mutex<Frontier>> {
        Arc::clone(&self.frontier)
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Runs the crawl to completion
    ///
    /// # Termination
    ///
    /// The crawl ends when nothing is queued and nothing is in flight. Work
    /// is admitted only while `fetched + in_flight < max_pages` and the run
    /// is not interrupted; whatever is still queued then is marked skipped.
    pub async fn run(&self) -> CrawlReport {
        tracing::info!(
            "Starting crawl of {} (max depth {}, max pages {}, {} workers)",
            self.seed,
            self.config.max_depth,
            self.config.max_pages,
            self.config.workers
        );

        lock(&self.frontier).enqueue(self.seed.clone(), 0);

        let worker = Arc::new(PageWorker {
            seed: self.seed.clone(),
            pages_dir: self.pages_dir.clone(),
            fetcher: self.fetcher.clone(),
            assets: self.assets.clone(),
            frontier: Arc::clone(&self.frontier),
        });

        let semaphore = Arc::new(Semaphore::new(self.config.workers as usize));
        let max_pages = self.config.max_pages as usize;
        let start_time = Instant::now();

        let mut tasks: JoinSet<PageOutcome> = JoinSet::new();
        let mut report = CrawlReport::default();

        loop {
            while !self.is_interrupted() && report.pages.len() + tasks.len() < max_pages {
                let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                    break;
                };

                let entry = {
                    let mut frontier = lock(&self.frontier);
                    match frontier.dequeue_next() {
                        Some(entry) if entry.depth > self.config.max_depth => {
                            frontier.mark_skipped(&entry.url, SkipReason::DepthExceeded);
                            continue;
                        }
                        Some(entry) => {
                            if !frontier.mark_visited(&entry.url) {
                                continue;
                            }
                            entry
                        }
                        None => break,
                    }
                };

                tracing::debug!("Fetching {} (depth {})", entry.url, entry.depth);
                let worker = Arc::clone(&worker);
                tasks.spawn(async move {
                    let outcome = process_page(&worker, entry).await;
                    drop(permit);
                    outcome
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            match joined {
                Ok(PageOutcome {
                    result: Ok(page), ..
                }) => {
                    tracing::debug!(
                        "Saved {} as {}{}",
                        page.url,
                        page.path.display(),
                        page.title
                            .as_deref()
                            .map(|t| format!(" ({})", t))
                            .unwrap_or_default()
                    );
                    report.pages.push(page);

                    if report.pages.len() % PROGRESS_INTERVAL == 0 {
                        let elapsed = start_time.elapsed();
                        let rate = report.pages.len() as f64 / elapsed.as_secs_f64();
                        tracing::info!(
                            "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                            report.pages.len(),
                            lock(&self.frontier).queued_len(),
                            rate
                        );
                    }
                }
                Ok(PageOutcome {
                    url,
                    result: Err(e),
                }) => {
                    tracing::warn!("Failed to crawl {}: {}", url, e);
                    self.logs.record(LogKind::Crawl, &format!("{} {}", url, e));
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!("Page task failed: {}", e);
                    self.logs.record(LogKind::Crawl, &format!("page task failed: {}", e));
                    report.failed += 1;
                }
            }
        }

        let mut frontier = lock(&self.frontier);
        report.interrupted = self.is_interrupted();
        let reason = if report.interrupted {
            SkipReason::Interrupted
        } else {
            SkipReason::PageBudgetReached
        };
        let drained = frontier.drain_skipped(reason);
        if drained > 0 {
            tracing::info!("Left {} queued URLs unvisited ({})", drained, reason);
        }

        report.skipped = frontier.skipped_count();
        report.discovered = frontier.visited_count() + report.skipped;

        tracing::info!(
            "Crawl completed: {} pages crawled, {} failed, {} skipped in {:?}",
            report.pages.len(),
            report.failed,
            report.skipped,
            start_time.elapsed()
        );

        report
    }
}

/// Fetches, rewrites, localizes and saves one page
async fn process_page(worker: &PageWorker, entry: FrontierEntry) -> PageOutcome {
    let url = entry.url.clone();
    let result = save_page(worker, entry).await;
    PageOutcome { url, result }
}

async fn save_page(worker: &PageWorker, entry: FrontierEntry) -> Result<SavedPage, PageError> {
    let path = worker
        .pages_dir
        .join(to_local_path(&entry.url, worker.seed.origin()));

    let page = worker.fetcher.fetch(entry.url.as_url(), &path).await?;
    let title = extract_title(&page.body);

    let rewritten = rewrite_links(&page.body, &worker.seed, &page.final_url);
    {
        let mut frontier = lock(&worker.frontier);
        let added = rewritten
            .discovered
            .into_iter()
            .filter(|target| {
                let depth = relative_depth(target, &worker.seed);
                frontier.enqueue(target.clone(), depth)
            })
            .count();
        tracing::trace!("{}: {} links rewritten, {} new", entry.url, rewritten.rewritten, added);
    }

    let html = match &worker.assets {
        Some(assets) => {
            let localized = assets.localize(&rewritten.html, &worker.seed, &path).await;
            if localized.failed > 0 {
                tracing::debug!("{}: {} assets kept remote", entry.url, localized.failed);
            }
            localized.html
        }
        None => rewritten.html,
    };

    tokio::fs::write(&path, html)
        .await
        .map_err(|source| PageError::Save {
            path: path.clone(),
            source,
        })?;

    Ok(SavedPage {
        url: entry.url,
        path,
        depth: entry.depth,
        title,
    })
}

/// Locks the frontier, recovering the data if a holder panicked
fn lock(frontier: &Mutex<Frontier>) -> std::sync::MutexGuard<'_, Frontier> {
    frontier.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::crawler::fetcher::{build_http_client, HttpFetcher};
    use crate::state::EntryState;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
    }

    async fn mount(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html(body))
            .mount(server)
            .await;
    }

    fn coordinator(
        server: &MockServer,
        dir: &std::path::Path,
        max_depth: u32,
        max_pages: u32,
    ) -> Coordinator {
        let fetch_config = FetchConfig {
            max_retries: 0,
            ..Default::default()
        };
        let http = HttpFetcher::new(build_http_client(&fetch_config).unwrap(), &fetch_config);
        let logs = Arc::new(RunLogs::open(dir).unwrap());
        let config = CrawlerConfig {
            max_depth,
            max_pages,
            workers: 2,
        };
        Coordinator::new(
            CanonicalUrl::parse(&server.uri()).unwrap(),
            config,
            dir.to_path_buf(),
            FetchChain::new(vec![crate::crawler::FetchStrategy::Http(http)]),
            logs,
        )
    }

    #[tokio::test]
    async fn test_depth_cutoff() {
        let server = MockServer::start().await;
        mount(&server, "/", r#"<a href="/a">a</a>"#).await;
        mount(&server, "/a", r#"<a href="/a/b">b</a>"#).await;
        Mock::given(method("GET"))
            .and(path("/a/b"))
            .respond_with(html(r#"<a href="/a/b/c">c</a>"#))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(&server, dir.path(), 1, 10);
        let report = coordinator.run().await;

        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.skipped, 1);

        let frontier = coordinator.frontier();
        let frontier = frontier.lock().unwrap();
        let ab = CanonicalUrl::parse(&format!("{}/a/b", server.uri())).unwrap();
        let abc = CanonicalUrl::parse(&format!("{}/a/b/c", server.uri())).unwrap();
        assert_eq!(
            frontier.state(&ab),
            Some(EntryState::Skipped(SkipReason::DepthExceeded))
        );
        assert!(!frontier.contains(&abc));

        let saved = std::fs::read_to_string(dir.path().join("a.html")).unwrap();
        assert_eq!(saved, r#"<a href="a_b.html">b</a>"#);
    }

    #[tokio::test]
    async fn test_page_budget() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/",
            r#"<a href="/p1">1</a><a href="/p2">2</a><a href="/p3">3</a>"#,
        )
        .await;
        for route in ["/p1", "/p2", "/p3"] {
            mount(&server, route, "leaf").await;
        }

        let dir = tempfile::tempdir().unwrap();
        let report = coordinator(&server, dir.path(), 2, 2).run().await;

        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.skipped, 2);
        assert!(!report.interrupted);
    }

    #[tokio::test]
    async fn test_failures_are_logged_and_crawl_continues() {
        let server = MockServer::start().await;
        mount(&server, "/", r#"<a href="/gone">x</a><a href="/ok">y</a>"#).await;
        mount(&server, "/ok", "fine").await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let report = coordinator(&server, dir.path(), 2, 10).run().await;

        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.failed, 1);
        let log = std::fs::read_to_string(dir.path().join("crawl_errors.log")).unwrap();
        assert!(log.contains("/gone"));
        assert!(log.contains("HTTP 404"));
    }

    #[tokio::test]
    async fn test_interrupted_before_start_fetches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html("never"))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let report = coordinator(&server, dir.path(), 2, 10)
            .with_interrupt(flag)
            .run()
            .await;

        assert!(report.interrupted);
        assert!(report.pages.is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_https_links_on_seed_host_are_crawled() {
        // Pages of an http seed that link back through https, as a site
        // redirected to https does
        let server = MockServer::start().await;
        let secure = server.uri().replacen("http://", "https://", 1);
        mount(&server, "/", &format!(r#"<a href="{}/a">a</a>"#, secure)).await;
        mount(&server, "/a", &format!(r#"<a href="{}/">home</a>"#, secure)).await;

        let dir = tempfile::tempdir().unwrap();
        let report = coordinator(&server, dir.path(), 2, 10).run().await;

        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.failed, 0);
        let saved = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert_eq!(saved, r#"<a href="a.html">a</a>"#);
        let saved = std::fs::read_to_string(dir.path().join("a.html")).unwrap();
        assert_eq!(saved, r#"<a href="index.html">home</a>"#);
    }
}
