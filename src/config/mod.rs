//! Configuration module for Sitebook
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file, and expanding the command templates that describe the
//! external collaborators (browser fetcher, renderer, merger).
//!
//! # Example
//!
//! ```no_run
//! use sitebook::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitebook.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod template;
mod types;
mod validation;

// Re-export types
pub use template::TemplateVars;
pub use types::{
    AssetConfig, BrowserConfig, CommandTemplate, Config, CrawlerConfig, FetchConfig, MergeConfig,
    RenderConfig, RenderStrategyConfig, WorkspaceConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
