use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Sitebook
///
/// Every section is optional in the TOML file; missing sections and fields
/// take the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    pub browser: BrowserConfig,
    pub assets: AssetConfig,
    pub render: RenderConfig,
    pub merge: MergeConfig,
    pub workspace: WorkspaceConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl, relative to the seed URL
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of pages to fetch successfully
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Maximum number of pages fetched and rewritten concurrently
    pub workers: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 100,
            workers: 4,
        }
    }
}

/// Plain HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Wall-clock limit for a single attempt (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Connect timeout for a single attempt (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Extra attempts after a transient failure
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Pause between attempts (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// User agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 3,
            retry_delay_ms: 1000,
            user_agent: format!("sitebook/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Browser collaborator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Try the browser collaborator before plain HTTP
    pub enabled: bool,

    /// Wall-clock limit for one browser fetch (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Command invoked as `(url, output, timeout)`
    pub command: CommandTemplate,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: 120,
            command: CommandTemplate::new(
                "sitebook-browser-fetch",
                &["{url}", "{output}", "{timeout}"],
            ),
        }
    }
}

/// Asset localization configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Download stylesheets and images next to each page
    pub enabled: bool,

    /// Also download assets hosted on other origins
    pub external: bool,

    /// Wall-clock limit for one asset download (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Upper bound on downloads per page
    #[serde(rename = "max-per-page")]
    pub max_per_page: u32,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            external: true,
            timeout_secs: 20,
            max_per_page: 200,
        }
    }
}

/// Render pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Wall-clock limit for one render attempt (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Maximum number of concurrent renders
    pub workers: u32,

    /// Media profile handed to the renderer
    pub media: String,

    /// Strategies, tried in order until one produces output
    pub strategies: Vec<RenderStrategyConfig>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            workers: 2,
            media: "print".to_string(),
            strategies: vec![
                RenderStrategyConfig {
                    name: "primary".to_string(),
                    command: CommandTemplate::new(
                        "weasyprint",
                        &[
                            "--base-url",
                            "{base}",
                            "--media-type",
                            "{media}",
                            "--presentational-hints",
                            "{html}",
                            "{output}",
                        ],
                    ),
                },
                RenderStrategyConfig {
                    name: "simplified".to_string(),
                    command: CommandTemplate::new(
                        "weasyprint",
                        &["--base-url", "{base}", "--media-type", "{media}", "{html}", "{output}"],
                    ),
                },
                RenderStrategyConfig {
                    name: "minimal".to_string(),
                    command: CommandTemplate::new("weasyprint", &["{html}", "{output}"]),
                },
            ],
        }
    }
}

/// One named render strategy
#[derive(Debug, Clone, Deserialize)]
pub struct RenderStrategyConfig {
    /// Name used in logs and failure records
    pub name: String,

    /// Command invoked for this strategy
    pub command: CommandTemplate,
}

/// Merge collaborator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Wall-clock limit for the merge (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Command invoked with the ordered inputs and the output path
    pub command: CommandTemplate,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            command: CommandTemplate::new("pdfunite", &["{inputs}", "{output}"]),
        }
    }
}

/// Scratch workspace configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory for the scratch workspace (system temp dir if unset)
    pub root: Option<PathBuf>,

    /// Keep the scratch workspace after the run
    pub keep: bool,

    /// Copy logs and snapshots out of the workspace when the run ends
    #[serde(rename = "export-debug")]
    pub export_debug: bool,

    /// Where debug artifacts are copied, relative to the working directory
    #[serde(rename = "debug-dir")]
    pub debug_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            keep: false,
            export_debug: true,
            debug_dir: PathBuf::from("sitebook-debug"),
        }
    }
}

/// An external command with placeholder arguments
///
/// Supported placeholders: `{url}`, `{html}`, `{base}`, `{output}`,
/// `{media}`, `{timeout}`, and `{inputs}` (a whole argument that expands to
/// one argument per input path).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandTemplate {
    /// Program name or path
    pub program: String,

    /// Argument templates
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    /// Builds a template from string slices
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}
