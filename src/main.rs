//! Sitebook main entry point
//!
//! This is the command-line interface for turning a website, or a folder of
//! saved pages, into one document.

use clap::{Parser, Subcommand};
use sitebook::config::{load_config_with_hash, validate, Config};
use sitebook::{run_local, run_web, RunContext, RunResult, SiteBookError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sitebook: turn a website into a book
///
/// Sitebook crawls a site breadth-first from a seed URL (or walks a local
/// directory of HTML files), renders every page through an external
/// renderer and merges the rendered pages into one document in a stable
/// order.
#[derive(Parser, Debug)]
#[command(name = "sitebook")]
#[command(version)]
#[command(about = "Turn a website into a single document", long_about = None)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Maximum crawl depth, relative to the seed URL
    #[arg(short = 'd', long, global = true, value_name = "N")]
    max_depth: Option<u32>,

    /// Maximum number of pages to crawl
    #[arg(short = 'n', long, global = true, value_name = "N")]
    max_pages: Option<u32>,

    /// Keep the scratch workspace after the run
    #[arg(short, long, global = true)]
    keep: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Fetch pages through the browser collaborator first
    #[arg(short, long, global = true)]
    browser: bool,

    /// Path to TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Worker pool size for crawling and rendering
    #[arg(short = 'j', long, global = true, value_name = "N")]
    workers: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Crawl a website and merge its pages
    Web {
        /// Where the crawl starts; also fixes the site origin
        #[arg(value_name = "SEED_URL")]
        seed: String,

        /// Merged output document
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Render and merge the HTML files of a local directory
    Local {
        /// Directory searched recursively for .html and .htm files
        #[arg(value_name = "DIRECTORY")]
        directory: PathBuf,

        /// Merged output document
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(result) => {
            tracing::info!("Wrote {}", result.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e.exit_code();
            let report = anyhow::Error::new(e).context("sitebook run failed");
            tracing::error!("{:#}", report);
            ExitCode::from(code)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitebook=info,warn"),
            1 => EnvFilter::new("sitebook=debug,info"),
            2 => EnvFilter::new("sitebook=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration, applies command-line overrides and runs one mode
async fn run(cli: Cli) -> Result<RunResult, SiteBookError> {
    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    apply_overrides(&mut config, &cli);
    validate(&config)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(Arc::clone(&interrupted));

    let mut ctx = RunContext::new(config)?.with_interrupt(interrupted);
    if let Some(hash) = config_hash {
        ctx = ctx.with_config_hash(hash);
    }

    match &cli.mode {
        Mode::Web { seed, output } => {
            tracing::info!("Building {} from {}", output.display(), seed);
            run_web(&ctx, seed, output).await
        }
        Mode::Local { directory, output } => {
            tracing::info!("Building {} from {}", output.display(), directory.display());
            run_local(&ctx, directory, output).await
        }
    }
}

/// Command-line flags take precedence over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = depth;
    }
    if let Some(pages) = cli.max_pages {
        config.crawler.max_pages = pages;
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
        config.render.workers = workers;
    }
    if cli.keep {
        config.workspace.keep = true;
    }
    if cli.browser {
        config.browser.enabled = true;
    }
}

/// Sets `interrupted` on Ctrl-C; in-flight work finishes, nothing new
/// starts and the run ends without merging
fn spawn_interrupt_handler(interrupted: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::warn!("Interrupted, finishing in-flight work before exiting");
        interrupted.store(true, Ordering::SeqCst);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_web_mode_with_global_options() {
        let cli = Cli::try_parse_from([
            "sitebook", "-d", "1", "-n", "5", "-b", "web", "https://ex.com", "out.pdf",
        ])
        .unwrap();

        assert!(matches!(cli.mode, Mode::Web { ref seed, .. } if seed == "https://ex.com"));
        assert_eq!(cli.max_depth, Some(1));
        assert_eq!(cli.max_pages, Some(5));
        assert!(cli.browser);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "sitebook", "local", "site", "out.pdf", "-j", "8", "--keep",
        ])
        .unwrap();
        let mut config = Config::default();

        apply_overrides(&mut config, &cli);

        assert_eq!(config.crawler.workers, 8);
        assert_eq!(config.render.workers, 8);
        assert!(config.workspace.keep);
        assert_eq!(config.crawler.max_depth, 2);
        assert!(!config.browser.enabled);
    }

    #[test]
    fn test_cli_rejects_missing_output() {
        let result = Cli::try_parse_from(["sitebook", "web", "https://ex.com"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_override_is_validated() {
        let cli = Cli::try_parse_from(["sitebook", "-n", "0", "web", "https://ex.com", "o.pdf"])
            .unwrap();
        let mut config = Config::default();
        apply_overrides(&mut config, &cli);

        let err = SiteBookError::from(validate(&config).unwrap_err());
        assert_eq!(err.exit_code(), 3);
    }
}
