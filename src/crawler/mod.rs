//! Crawler module for web mode
//!
//! This module contains the crawl side of the pipeline, including:
//! - The breadth-first frontier with dedup and depth tracking
//! - Page fetching (HTTP with retries, optional browser collaborator)
//! - The tolerant tag scanner used for rewriting
//! - In-page link rewriting and asset localization
//! - Overall crawl coordination

mod assets;
mod browser;
mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod rewriter;

pub use assets::{AssetError, AssetLocalizer, LocalizeOutcome, ASSET_DIR_SUFFIX};
pub use browser::{BrowserError, BrowserFetch, CommandBrowserFetcher};
pub use coordinator::{Coordinator, CrawlReport, SavedPage};
pub use fetcher::{
    build_http_client, FetchChain, FetchError, FetchStrategy, FetchedPage, HttpFetcher,
    MAX_REDIRECTS,
};
pub use frontier::{Frontier, FrontierEntry, FrontierSnapshots};
pub use parser::{declare_utf8, extract_title, scan_tags, splice, Attribute, Replacement, Tag};
pub use rewriter::{rewrite_links, RewriteOutcome};
