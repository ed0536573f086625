//! Page fetching
//!
//! This module gets the raw HTML of a page:
//! - [`HttpFetcher`]: plain HTTP GET with a per-attempt timeout and a bounded
//!   number of retries with a fixed pause
//! - [`FetchChain`]: an ordered list of strategies (the optional browser
//!   collaborator first, then HTTP) tried until one succeeds
//!
//! # Failure Classification
//!
//! | Condition | Class |
//! |-----------|-------|
//! | Connect error, timeout, body read error | Transient |
//! | HTTP 5xx | Transient |
//! | HTTP 4xx and other non-success codes | Terminal |
//! | Non-HTML `Content-Type` | Terminal |
//! | Redirect loop or chain > 10 | Terminal |

use crate::config::{BrowserConfig, FetchConfig};
use crate::crawler::browser::BrowserFetch;
use crate::crawler::parser::declare_utf8;
use crate::workspace::{LogKind, RunLogs};
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client, StatusCode};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed by the HTTP client
pub const MAX_REDIRECTS: usize = 10;

/// A fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; relative links resolve against it
    pub final_url: Url,

    /// Page body, decoded to UTF-8; [`FetchChain`] also rewrites its
    /// charset declarations to match
    pub body: String,

    /// Name of the strategy that produced the page
    pub strategy: &'static str,
}

/// Errors that end the fetch of one URL
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("not HTML ({content_type}) at {url}")]
    NotHtml { url: String, content_type: String },

    #[error("gave up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("browser fetch of {url} failed: {message}")]
    Browser { url: String, message: String },
}

/// Whether a failed attempt is worth repeating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureType {
    Transient,
    Terminal,
}

/// Builds the HTTP client shared by page and asset fetches
///
/// Redirects are followed up to [`MAX_REDIRECTS`] hops.
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP fetcher with bounded retries
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client, config: &FetchConfig) -> Self {
        Self {
            client,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Fetches `url`, retrying transient failures
    ///
    /// At most `max_retries` extra attempts are made, each after a fixed
    /// pause. Terminal failures return immediately.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(url).await {
                Ok(page) => return Ok(page),
                Err((FailureType::Terminal, e)) => return Err(e),
                Err((FailureType::Transient, e)) => {
                    if attempt > self.max_retries {
                        return Err(FetchError::RetriesExhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    tracing::debug!(
                        "Attempt {} for {} failed ({}), retrying in {:?}",
                        attempt,
                        url,
                        e,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn attempt(&self, url: &Url) -> Result<FetchedPage, (FailureType, FetchError)> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let failure = if is_transient_status(status) {
                FailureType::Transient
            } else {
                FailureType::Terminal
            };
            return Err((
                failure,
                FetchError::HttpStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                },
            ));
        }

        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default().to_ascii_lowercase();
            if !content_type.contains("html") {
                return Err((
                    FailureType::Terminal,
                    FetchError::NotHtml {
                        url: url.to_string(),
                        content_type,
                    },
                ));
            }
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(url, e))?;

        Ok(FetchedPage {
            final_url,
            body,
            strategy: "http",
        })
    }
}

/// Returns true for status codes worth another attempt
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
}

fn classify_request_error(url: &Url, e: reqwest::Error) -> (FailureType, FetchError) {
    let failure = if e.is_redirect() || e.is_builder() {
        FailureType::Terminal
    } else if e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
    {
        FailureType::Transient
    } else if e.status().map(is_transient_status).unwrap_or(false) {
        FailureType::Transient
    } else {
        FailureType::Terminal
    };

    (
        failure,
        FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        },
    )
}

/// One way of getting a page
#[derive(Clone)]
pub enum FetchStrategy {
    /// The browser collaborator, bounded by its own timeout
    Browser {
        fetcher: Arc<dyn BrowserFetch>,
        timeout: Duration,
    },

    /// Plain HTTP
    Http(HttpFetcher),
}

impl FetchStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Browser { .. } => "browser",
            Self::Http(_) => "http",
        }
    }
}

impl std::fmt::Debug for FetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered fetch strategies
///
/// Strategies are tried in order. Every failure is recorded in the run log
/// of its strategy; the last error is returned when all of them fail.
#[derive(Debug, Clone)]
pub struct FetchChain {
    strategies: Vec<FetchStrategy>,
    logs: Option<Arc<RunLogs>>,
}

impl FetchChain {
    pub fn new(strategies: Vec<FetchStrategy>) -> Self {
        Self {
            strategies,
            logs: None,
        }
    }

    /// Builds the standard chain: browser first when enabled, then HTTP
    pub fn standard(
        http: HttpFetcher,
        browser: Option<Arc<dyn BrowserFetch>>,
        config: &BrowserConfig,
    ) -> Self {
        let mut strategies = Vec::with_capacity(2);
        if let Some(fetcher) = browser.filter(|_| config.enabled) {
            strategies.push(FetchStrategy::Browser {
                fetcher,
                timeout: Duration::from_secs(config.timeout_secs),
            });
        }
        strategies.push(FetchStrategy::Http(http));
        Self::new(strategies)
    }

    /// Records strategy failures into the run logs
    pub fn with_logs(mut self, logs: Arc<RunLogs>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn strategies(&self) -> &[FetchStrategy] {
        &self.strategies
    }

    /// Fetches `url`, using `scratch` as the browser output file
    pub async fn fetch(&self, url: &Url, scratch: &Path) -> Result<FetchedPage, FetchError> {
        let mut last_error = None;

        for strategy in &self.strategies {
            let result = match strategy {
                FetchStrategy::Browser { fetcher, timeout } => {
                    fetch_with_browser(fetcher.as_ref(), url, scratch, *timeout).await
                }
                FetchStrategy::Http(http) => http.fetch(url).await,
            };

            match result {
                Ok(mut page) => {
                    page.body = declare_utf8(&page.body);
                    return Ok(page);
                }
                Err(e) => {
                    tracing::debug!("{} strategy failed for {}: {}", strategy.name(), url, e);
                    if let (Some(logs), FetchStrategy::Browser { .. }) = (&self.logs, strategy) {
                        logs.record(LogKind::Browser, &e.to_string());
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Request {
            url: url.to_string(),
            message: "no fetch strategy configured".to_string(),
        }))
    }
}

async fn fetch_with_browser(
    fetcher: &dyn BrowserFetch,
    url: &Url,
    output: &Path,
    timeout: Duration,
) -> Result<FetchedPage, FetchError> {
    let browser_error = |message: String| FetchError::Browser {
        url: url.to_string(),
        message,
    };

    fetcher
        .fetch_to(url, output, timeout)
        .await
        .map_err(|e| browser_error(e.to_string()))?;

    let bytes = tokio::fs::read(output)
        .await
        .map_err(|e| browser_error(format!("cannot read output: {}", e)))?;
    if bytes.is_empty() {
        return Err(browser_error("empty output".to_string()));
    }

    Ok(FetchedPage {
        final_url: url.clone(),
        body: String::from_utf8_lossy(&bytes).into_owned(),
        strategy: "browser",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::browser::BrowserError;
    use async_trait::async_trait;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(max_retries: u32) -> FetchConfig {
        FetchConfig {
            max_retries,
            retry_delay_ms: 10,
            request_timeout_secs: 5,
            ..Default::default()
        }
    }

    fn fetcher(max_retries: u32) -> HttpFetcher {
        let config = fast_config(max_retries);
        HttpFetcher::new(build_http_client(&config).unwrap(), &config)
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(html("<html>ok</html>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let page = fetcher(0).fetch(&url).await.unwrap();
        assert_eq!(page.body, "<html>ok</html>");
        assert_eq!(page.strategy, "http");
    }

    #[tokio::test]
    async fn test_404_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let result = fetcher(3).fetch(&url).await;
        assert!(matches!(result, Err(FetchError::HttpStatus { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_5xx_is_retried_then_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/flaky", server.uri())).unwrap();
        let result = fetcher(2).fetch(&url).await;
        assert!(matches!(
            result,
            Err(FetchError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_non_html_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(b"%PDF".to_vec(), "application/pdf"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/doc.pdf", server.uri())).unwrap();
        let result = fetcher(3).fetch(&url).await;
        assert!(matches!(result, Err(FetchError::NotHtml { .. })));
    }

    #[tokio::test]
    async fn test_redirect_reports_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new/"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new/"))
            .respond_with(html("moved"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
        let page = fetcher(0).fetch(&url).await.unwrap();
        assert_eq!(page.final_url.path(), "/new/");
    }

    #[tokio::test]
    async fn test_connection_refused_exhausts_retries() {
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let result = fetcher(1).fetch(&url).await;
        assert!(matches!(
            result,
            Err(FetchError::RetriesExhausted { attempts: 2, .. })
        ));
    }

    struct FailingBrowser;

    #[async_trait]
    impl BrowserFetch for FailingBrowser {
        async fn fetch_to(
            &self,
            _url: &Url,
            _output: &Path,
            _timeout: Duration,
        ) -> Result<(), BrowserError> {
            Err(BrowserError::Failed("challenge not solved".to_string()))
        }
    }

    struct WritingBrowser;

    #[async_trait]
    impl BrowserFetch for WritingBrowser {
        async fn fetch_to(
            &self,
            _url: &Url,
            output: &Path,
            _timeout: Duration,
        ) -> Result<(), BrowserError> {
            tokio::fs::write(output, "<html>rendered</html>")
                .await
                .map_err(|e| BrowserError::Failed(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_chain_falls_back_to_http_and_logs_browser_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html("plain"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let logs = Arc::new(RunLogs::open(dir.path()).unwrap());
        let config = BrowserConfig {
            enabled: true,
            ..Default::default()
        };
        let chain = FetchChain::standard(fetcher(0), Some(Arc::new(FailingBrowser)), &config)
            .with_logs(logs.clone());

        let url = Url::parse(&server.uri()).unwrap();
        let page = chain.fetch(&url, &dir.path().join("scratch.html")).await.unwrap();

        assert_eq!(page.strategy, "http");
        let browser_log = std::fs::read_to_string(logs.path(LogKind::Browser)).unwrap();
        assert!(browser_log.contains("challenge not solved"));
    }

    #[tokio::test]
    async fn test_chain_prefers_browser_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = BrowserConfig {
            enabled: true,
            ..Default::default()
        };
        let chain = FetchChain::standard(fetcher(0), Some(Arc::new(WritingBrowser)), &config);

        let url = Url::parse("http://127.0.0.1:9/page").unwrap();
        let page = chain.fetch(&url, &dir.path().join("page.html")).await.unwrap();

        assert_eq!(page.strategy, "browser");
        assert_eq!(page.body, "<html>rendered</html>");
    }

    #[test]
    fn test_browser_skipped_when_disabled() {
        let chain = FetchChain::standard(
            fetcher(0),
            Some(Arc::new(WritingBrowser)),
            &BrowserConfig::default(),
        );
        let names: Vec<_> = chain.strategies().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["http"]);
    }
}
