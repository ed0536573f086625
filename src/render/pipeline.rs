use crate::command::{is_non_empty_file, CommandError};
use crate::config::{RenderConfig, RenderStrategyConfig};
use crate::render::renderer::{RenderError, RenderRequest, Renderer};
use crate::workspace::{LogKind, RunLogs};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Rendered pages between two progress lines
const PROGRESS_INTERVAL: usize = 10;

/// One HTML file to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    /// The HTML artifact
    pub html: PathBuf,

    /// Base directory for the page's relative references
    pub base_dir: PathBuf,

    /// Where the rendered document goes
    pub output: PathBuf,
}

/// A successfully rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// The HTML artifact it came from
    pub source: PathBuf,

    /// The rendered document
    pub output: PathBuf,

    /// Name of the strategy that produced it
    pub strategy: String,
}

/// Why one strategy attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderAttemptError {
    /// The attempt exceeded its wall-clock limit and was killed
    Timeout(Duration),

    /// The renderer ran and reported failure
    ExitStatus(String),

    /// The renderer could not be started
    Spawn(String),

    /// The renderer succeeded but left no output
    EmptyOutput,

    /// The render task panicked
    Panicked(String),
}

impl fmt::Display for RenderAttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(limit) => write!(f, "timed out after {}s", limit.as_secs()),
            Self::ExitStatus(message) => write!(f, "failed: {}", message),
            Self::Spawn(message) => write!(f, "could not start: {}", message),
            Self::EmptyOutput => f.write_str("empty output"),
            Self::Panicked(message) => write!(f, "panicked: {}", message),
        }
    }
}

/// One failed strategy attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderAttempt {
    pub strategy: String,
    pub error: RenderAttemptError,
}

/// Every strategy failed for a page
#[derive(Debug, Clone, Error)]
#[error("all render strategies failed for {}: {}", .html.display(), attempts_summary(.attempts))]
pub struct RenderFailure {
    /// The HTML artifact that could not be rendered
    pub html: PathBuf,

    /// The attempts, in strategy order
    pub attempts: Vec<RenderAttempt>,
}

impl RenderFailure {
    /// Returns true if any attempt hit its timeout
    pub fn timed_out(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a.error, RenderAttemptError::Timeout(_)))
    }
}

fn attempts_summary(attempts: &[RenderAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{} {}", a.strategy, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Results of rendering a batch, in input order
#[derive(Debug, Clone, Default)]
pub struct RenderBatch {
    pub rendered: Vec<RenderedArtifact>,
    pub failures: Vec<RenderFailure>,

    /// Jobs never started because the run was interrupted
    pub not_started: usize,
}

/// Ordered strategy fallback with per-attempt timeouts
#[derive(Clone)]
pub struct RenderPipeline {
    renderer: Arc<dyn Renderer>,
    config: RenderConfig,
    logs: Option<Arc<RunLogs>>,
    interrupted: Arc<AtomicBool>,
}

impl RenderPipeline {
    pub fn new(renderer: Arc<dyn Renderer>, config: RenderConfig) -> Self {
        Self {
            renderer,
            config,
            logs: None,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Records failures into `render_errors.log`
    pub fn with_logs(mut self, logs: Arc<RunLogs>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Shares an interruption flag; once set, no new job is started
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// Renders one page, trying each strategy in order
    ///
    /// The first strategy that succeeds and leaves a non-empty output wins.
    /// Empty outputs are removed and count as failed attempts.
    pub async fn render_one(&self, job: &RenderJob) -> Result<RenderedArtifact, RenderFailure> {
        let limit = Duration::from_secs(self.config.timeout_secs);
        let request = RenderRequest {
            html: job.html.clone(),
            base_dir: job.base_dir.clone(),
            output: job.output.clone(),
            media: self.config.media.clone(),
            timeout: limit,
        };

        let mut attempts = Vec::with_capacity(self.config.strategies.len());

        for strategy in &self.config.strategies {
            match self.attempt(&request, strategy, limit).await {
                Ok(()) => {
                    if !attempts.is_empty() {
                        tracing::debug!(
                            "{} rendered with fallback strategy {}",
                            job.html.display(),
                            strategy.name
                        );
                    }
                    return Ok(RenderedArtifact {
                        source: job.html.clone(),
                        output: job.output.clone(),
                        strategy: strategy.name.clone(),
                    });
                }
                Err(error) => {
                    tracing::debug!(
                        "Strategy {} failed for {}: {}",
                        strategy.name,
                        job.html.display(),
                        error
                    );
                    attempts.push(RenderAttempt {
                        strategy: strategy.name.clone(),
                        error,
                    });
                }
            }
        }

        let failure = RenderFailure {
            html: job.html.clone(),
            attempts,
        };
        self.record_failure(&failure);
        Err(failure)
    }

    fn record_failure(&self, failure: &RenderFailure) {
        tracing::warn!("{}", failure);
        if let Some(logs) = &self.logs {
            logs.record(LogKind::Render, &failure.to_string());
        }
    }

    async fn attempt(
        &self,
        request: &RenderRequest,
        strategy: &RenderStrategyConfig,
        limit: Duration,
    ) -> Result<(), RenderAttemptError> {
        remove_stale(&request.output).await;

        let result = tokio::time::timeout(limit, self.renderer.render(request, strategy)).await;
        let error = match result {
            Err(_) => Some(RenderAttemptError::Timeout(limit)),
            Ok(Err(e)) => Some(classify(e)),
            Ok(Ok(())) => {
                if is_non_empty_file(&request.output).await {
                    None
                } else {
                    Some(RenderAttemptError::EmptyOutput)
                }
            }
        };

        match error {
            None => Ok(()),
            Some(error) => {
                remove_stale(&request.output).await;
                Err(error)
            }
        }
    }

    /// Renders every job on a bounded pool
    ///
    /// At most `render.workers` jobs run at once. Results are reported in
    /// input order regardless of completion order.
    pub async fn render_all(&self, jobs: Vec<RenderJob>) -> RenderBatch {
        let total = jobs.len();
        let semaphore = Arc::new(Semaphore::new(self.config.workers as usize));
        let mut tasks = JoinSet::new();
        let mut running = HashMap::new();
        let mut batch = RenderBatch::default();

        for (index, job) in jobs.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if self.interrupted.load(Ordering::SeqCst) {
                batch.not_started = total - index;
                tracing::warn!("Interrupted, {} pages left unrendered", batch.not_started);
                break;
            }

            let pipeline = self.clone();
            let html = job.html.clone();
            let handle = tasks.spawn(async move {
                let result = pipeline.render_one(&job).await;
                drop(permit);
                (index, result)
            });
            running.insert(handle.id(), (index, html));
        }

        let mut results = Vec::with_capacity(total);
        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    // A lost task still counts as a failed page
                    let Some((index, html)) = running.remove(&e.id()) else {
                        tracing::error!("Render task failed: {}", e);
                        continue;
                    };
                    let failure = RenderFailure {
                        html,
                        attempts: vec![RenderAttempt {
                            strategy: "renderer".to_string(),
                            error: RenderAttemptError::Panicked(join_error_message(e)),
                        }],
                    };
                    self.record_failure(&failure);
                    results.push((index, Err(failure)));
                }
            }
            done += 1;
            if done % PROGRESS_INTERVAL == 0 {
                tracing::info!("Progress: {}/{} pages rendered", done, total);
            }
        }

        results.sort_by_key(|(index, _)| *index);
        for (_, result) in results {
            match result {
                Ok(artifact) => batch.rendered.push(artifact),
                Err(failure) => batch.failures.push(failure),
            }
        }

        tracing::info!(
            "Rendered {} pages, {} failed",
            batch.rendered.len(),
            batch.failures.len()
        );
        batch
    }
}

impl fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn join_error_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string())
}

fn classify(error: RenderError) -> RenderAttemptError {
    match error {
        RenderError::Command(CommandError::Timeout { limit, .. }) => {
            RenderAttemptError::Timeout(limit)
        }
        RenderError::Command(CommandError::Spawn { source, .. }) => {
            RenderAttemptError::Spawn(source.to_string())
        }
        RenderError::Command(e @ CommandError::ExitStatus { .. }) => {
            RenderAttemptError::ExitStatus(e.to_string())
        }
        RenderError::Failed(message) => RenderAttemptError::ExitStatus(message),
    }
}

async fn remove_stale(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}
