use crate::command::{run_with_timeout, CommandError};
use crate::config::{RenderStrategyConfig, TemplateVars};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a renderer for one attempt
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{0}")]
    Failed(String),
}

/// Everything a renderer needs to turn one HTML file into one document
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// The HTML file to render
    pub html: PathBuf,

    /// Directory that relative references in the page resolve against
    pub base_dir: PathBuf,

    /// Where the document is written
    pub output: PathBuf,

    /// Media profile (for example `print`)
    pub media: String,

    /// Wall-clock limit for the attempt
    pub timeout: Duration,
}

/// The HTML-to-document rendering collaborator
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders `request.html` to `request.output` using `strategy`
    async fn render(
        &self,
        request: &RenderRequest,
        strategy: &RenderStrategyConfig,
    ) -> Result<(), RenderError>;
}

/// Renderer that runs the command template of each strategy
#[derive(Debug, Clone, Default)]
pub struct CommandRenderer;

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(
        &self,
        request: &RenderRequest,
        strategy: &RenderStrategyConfig,
    ) -> Result<(), RenderError> {
        let vars = TemplateVars {
            html: Some(&request.html),
            base: Some(&request.base_dir),
            output: Some(&request.output),
            media: Some(&request.media),
            timeout_secs: Some(request.timeout.as_secs()),
            ..Default::default()
        };
        let args = strategy.command.expand(&vars);

        run_with_timeout(
            &strategy.command.program,
            &args,
            Some(&request.base_dir),
            request.timeout,
        )
        .await?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::CommandTemplate;

    #[tokio::test]
    async fn test_command_renderer_expands_template() {
        let dir = tempfile::tempdir().unwrap();
        let html = dir.path().join("page.html");
        std::fs::write(&html, "<html></html>").unwrap();

        let strategy = RenderStrategyConfig {
            name: "copy".to_string(),
            command: CommandTemplate::new(
                "sh",
                &["-c", "printf '%s' \"$2\" > \"$1\"", "{html}", "{output}", "{media}"],
            ),
        };
        let request = RenderRequest {
            html,
            base_dir: dir.path().to_path_buf(),
            output: dir.path().join("page.pdf"),
            media: "print".to_string(),
            timeout: Duration::from_secs(5),
        };

        CommandRenderer.render(&request, &strategy).await.unwrap();
        assert_eq!(std::fs::read_to_string(&request.output).unwrap(), "print");
    }
}
