//! Sitebook: turn a website or a folder of saved pages into one document
//!
//! This crate crawls a site breadth-first from a seed URL (or walks a local
//! directory of HTML files), rewrites in-page links so the saved pages form a
//! navigable offline graph, renders each page through an external renderer and
//! merges the rendered pages in a stable order.

pub mod command;
pub mod config;
pub mod crawler;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod state;
pub mod url;
pub mod workspace;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Sitebook operations
///
/// Only fatal conditions live here. Per-page failures (fetch, asset, render)
/// have their own error types and never abort a run on their own.
#[derive(Debug, Error)]
pub enum SiteBookError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No input found: {reason}")]
    NoInputFound { reason: String },

    #[error("No page rendered successfully ({failed} failed); see {log}")]
    NoSuccessfulRenders { failed: usize, log: PathBuf },

    #[error("Merge failed: {message}; see {log}")]
    MergeFailed { message: String, log: PathBuf },

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Interrupted; nothing was merged")]
    Interrupted,
}

impl SiteBookError {
    /// Process exit code reported by the command-line front end
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 3,
            Self::NoInputFound { .. } => 4,
            Self::NoSuccessfulRenders { .. } => 5,
            Self::MergeFailed { .. } => 6,
            Self::Interrupted => 130,
            _ => 1,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid command template: {0}")]
    InvalidTemplate(String),
}

/// URL-specific errors
///
/// Every variant means "this link is not navigable"; callers skip the link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Link is not navigable: {0}")]
    NotNavigable(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sitebook operations
pub type Result<T> = std::result::Result<T, SiteBookError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use output::RunResult;
pub use pipeline::{run_local, run_web, RunContext};
pub use state::{EntryState, SkipReason};
pub use url::{canonicalize, crawl_depth, to_local_path, CanonicalUrl};
