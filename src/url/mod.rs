//! URL handling module for Sitebook
//!
//! This module provides URL canonicalization, crawl depth, scope checks and
//! the mapping from canonical URLs to local file names. Everything here is
//! pure: no function in this module touches the network or the filesystem.

mod canonical;
mod domain;
mod local_path;

// Re-export main functions
pub use canonical::{canonicalize, crawl_depth, CanonicalUrl};
pub use domain::is_in_scope;
pub use local_path::{
    flatten_relative, local_href, to_local_path, INDEX_STEM, PAGE_EXTENSION, SEPARATOR,
};

/// Depth of `url` relative to the seed of the crawl
///
/// The seed always has depth 0, even when it is not the site root. Pages
/// above the seed in the path hierarchy also count as depth 0.
pub fn relative_depth(url: &CanonicalUrl, seed: &CanonicalUrl) -> u32 {
    crawl_depth(url).saturating_sub(crawl_depth(seed))
}
