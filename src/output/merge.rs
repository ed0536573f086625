//! Document merge collaborator
//!
//! The merge engine is an external program that concatenates rendered
//! documents in the order it is given.

use crate::command::{is_non_empty_file, run_with_timeout, CommandError};
use crate::config::{MergeConfig, TemplateVars};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a merger
#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("merged output {0} is missing or empty")]
    EmptyOutput(PathBuf),

    #[error("{0}")]
    Failed(String),
}

/// The document-merge collaborator
#[async_trait]
pub trait Merger: Send + Sync {
    /// Concatenates `inputs` in order into `output`
    ///
    /// Returns whatever diagnostic text the merge engine produced.
    async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<String, MergeError>;
}

/// Merger that runs the configured command template
#[derive(Debug, Clone)]
pub struct CommandMerger {
    config: MergeConfig,
}

impl CommandMerger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Merger for CommandMerger {
    async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<String, MergeError> {
        let vars = TemplateVars {
            output: Some(output),
            inputs,
            ..Default::default()
        };
        let args = self.config.command.expand(&vars);
        let limit = Duration::from_secs(self.config.timeout_secs);

        let result = run_with_timeout(&self.config.command.program, &args, None, limit).await?;

        if !is_non_empty_file(output).await {
            return Err(MergeError::EmptyOutput(output.to_path_buf()));
        }

        let mut diagnostics = result.stdout;
        diagnostics.push_str(&result.stderr);
        Ok(diagnostics.trim().to_string())
    }
}
