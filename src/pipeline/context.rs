use crate::config::Config;
use crate::crawler::{BrowserFetch, CommandBrowserFetcher};
use crate::output::{CommandMerger, Merger};
use crate::render::{CommandRenderer, Renderer};
use crate::workspace::{LogKind, RunLogs, Workspace};
use crate::SiteBookError;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything one run shares between its stages
///
/// The context owns the scratch [`Workspace`]; dropping the context at the
/// end of a run removes the workspace unless it is kept.
pub struct RunContext {
    pub config: Config,

    /// Hash of the configuration file, when one was loaded
    pub config_hash: Option<String>,

    /// Set once the run is asked to stop
    pub interrupted: Arc<AtomicBool>,

    workspace: Workspace,
    logs: Arc<RunLogs>,
    browser: Option<Arc<dyn BrowserFetch>>,
    renderer: Arc<dyn Renderer>,
    merger: Arc<dyn Merger>,
}

impl RunContext {
    /// Creates the workspace and the command-template collaborators
    pub fn new(config: Config) -> Result<Self, SiteBookError> {
        let workspace = Workspace::create(&config.workspace)?;
        Ok(Self::with_workspace(config, workspace))
    }

    /// Wraps an existing workspace
    pub fn with_workspace(config: Config, workspace: Workspace) -> Self {
        let browser: Option<Arc<dyn BrowserFetch>> = if config.browser.enabled {
            Some(Arc::new(CommandBrowserFetcher::new(
                config.browser.command.clone(),
            )))
        } else {
            None
        };

        Self {
            logs: workspace.logs_handle(),
            renderer: Arc::new(CommandRenderer),
            merger: Arc::new(CommandMerger::new(config.merge.clone())),
            interrupted: Arc::new(AtomicBool::new(false)),
            config_hash: None,
            browser,
            workspace,
            config,
        }
    }

    pub fn with_config_hash(mut self, hash: String) -> Self {
        self.config_hash = Some(hash);
        self
    }

    /// Shares an interruption flag (usually set by a Ctrl-C handler)
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// Replaces the browser collaborator; it is only used when enabled
    pub fn with_browser(mut self, browser: Arc<dyn BrowserFetch>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_merger(mut self, merger: Arc<dyn Merger>) -> Self {
        self.merger = merger;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn logs(&self) -> Arc<RunLogs> {
        Arc::clone(&self.logs)
    }

    pub fn browser(&self) -> Option<Arc<dyn BrowserFetch>> {
        self.browser.clone()
    }

    pub fn renderer(&self) -> Arc<dyn Renderer> {
        Arc::clone(&self.renderer)
    }

    pub fn merger(&self) -> Arc<dyn Merger> {
        Arc::clone(&self.merger)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Writes the config hash and effective limits at the head of `merge.log`
    pub(crate) fn record_header(&self, mode: &str, input: &str, output: &Path) {
        let log = self.logs.get(LogKind::Merge);
        let config = &self.config;

        log.record(&format!("sitebook {} {} {}", mode, input, output.display()));
        log.record(&format!(
            "config hash: {}",
            self.config_hash.as_deref().unwrap_or("none (defaults)")
        ));
        log.record(&format!(
            "limits: max-depth={} max-pages={} crawl-workers={} render-workers={} render-timeout={}s merge-timeout={}s",
            config.crawler.max_depth,
            config.crawler.max_pages,
            config.crawler.workers,
            config.render.workers,
            config.render.timeout_secs,
            config.merge.timeout_secs
        ));
        let strategies: Vec<&str> = config
            .render
            .strategies
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        log.record(&format!("render strategies: {}", strategies.join(", ")));
    }

    /// Copies logs and snapshots to the debug directory, if enabled
    pub(crate) fn export_debug(&self) {
        let settings = &self.config.workspace;
        if !settings.export_debug {
            return;
        }

        match self.workspace.export_debug(&settings.debug_dir) {
            Ok(copied) => tracing::info!(
                "Exported {} debug files to {}",
                copied.len(),
                settings.debug_dir.display()
            ),
            Err(e) => tracing::warn!(
                "Failed to export debug files to {}: {}",
                settings.debug_dir.display(),
                e
            ),
        }
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("workspace", &self.workspace.root())
            .field("config_hash", &self.config_hash)
            .field("interrupted", &self.is_interrupted())
            .finish_non_exhaustive()
    }
}
