//! Headless-browser page fetcher
//!
//! Used as an alternate page source when plain HTTP is blocked (bot
//! challenges, client-rendered pages). The browser itself is an external
//! program described by a command template.

use crate::command::{is_non_empty_file, run_with_timeout, CommandError};
use crate::config::{CommandTemplate, TemplateVars};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors reported by a browser fetcher
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("browser produced no output at {0}")]
    EmptyOutput(String),

    #[error("{0}")]
    Failed(String),
}

/// A collaborator that loads a page in a browser and saves its HTML
#[async_trait]
pub trait BrowserFetch: Send + Sync {
    /// Loads `url` and writes the resulting HTML to `output`
    ///
    /// Must give up after `timeout`.
    async fn fetch_to(&self, url: &Url, output: &Path, timeout: Duration)
        -> Result<(), BrowserError>;
}

/// Browser fetcher backed by an external command
///
/// The template receives `{url}`, `{output}` and `{timeout}` (seconds).
#[derive(Debug, Clone)]
pub struct CommandBrowserFetcher {
    template: CommandTemplate,
}

impl CommandBrowserFetcher {
    pub fn new(template: CommandTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl BrowserFetch for CommandBrowserFetcher {
    async fn fetch_to(
        &self,
        url: &Url,
        output: &Path,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let vars = TemplateVars {
            url: Some(url.as_str()),
            output: Some(output),
            timeout_secs: Some(timeout.as_secs()),
            ..Default::default()
        };
        let args = self.template.expand(&vars);

        run_with_timeout(&self.template.program, &args, None, timeout).await?;

        if !is_non_empty_file(output).await {
            return Err(BrowserError::EmptyOutput(output.display().to_string()));
        }

        tracing::debug!("Browser fetched {}", url);
        Ok(())
    }
}
