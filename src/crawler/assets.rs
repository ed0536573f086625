//! Asset localization
//!
//! Stylesheets and images referenced by a saved page are downloaded into a
//! folder next to the page and their references are rewritten, so that the
//! renderer does not need network access. A failed download leaves the
//! original reference in place.

use crate::config::AssetConfig;
use crate::crawler::parser::{scan_tags, splice, Attribute, Replacement, Tag};
use crate::url::{local_href, CanonicalUrl};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Suffix of the per-page asset folder
pub const ASSET_DIR_SUFFIX: &str = ".assets";

/// Extension used when an asset URL does not suggest one
const FALLBACK_EXTENSION: &str = "bin";

/// Errors that can occur while downloading one asset
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for asset {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to write asset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of localizing the assets of one page
#[derive(Debug, Clone, Default)]
pub struct LocalizeOutcome {
    /// The page with localized references
    pub html: String,

    /// Distinct assets downloaded
    pub downloaded: usize,

    /// Distinct assets that failed to download
    pub failed: usize,
}

/// Downloads page assets and rewrites their references
#[derive(Debug, Clone)]
pub struct AssetLocalizer {
    client: Client,
    config: AssetConfig,
}

impl AssetLocalizer {
    pub fn new(client: Client, config: AssetConfig) -> Self {
        Self { client, config }
    }

    /// Localizes the assets of the page saved at `page_file`
    ///
    /// Assets go to `<stem>.assets/` next to the page. Only absolute and
    /// origin-relative references are considered; each distinct URL is
    /// downloaded at most once per page.
    pub async fn localize(
        &self,
        html: &str,
        site: &CanonicalUrl,
        page_file: &Path,
    ) -> LocalizeOutcome {
        if !self.config.enabled {
            return LocalizeOutcome {
                html: html.to_string(),
                ..Default::default()
            };
        }

        let stem = page_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir_name = format!("{}{}", stem, ASSET_DIR_SUFFIX);
        let dir = page_file
            .parent()
            .map(|p| p.join(&dir_name))
            .unwrap_or_else(|| PathBuf::from(&dir_name));

        let mut outcome = LocalizeOutcome::default();
        let mut replacements = Vec::new();
        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        let mut attempts = 0u32;

        for tag in scan_tags(html, &["img", "link"]) {
            let Some(attr) = asset_attribute(&tag) else {
                continue;
            };
            let Some(url) = resolve_asset(&attr.decoded(), site) else {
                continue;
            };
            if !self.config.external && url.host_str() != Some(site.host()) {
                continue;
            }

            let key = url.as_str().to_string();
            let local = match resolved.get(&key) {
                Some(local) => local.clone(),
                None => {
                    if attempts >= self.config.max_per_page {
                        tracing::debug!(
                            "Asset limit reached on {}, keeping {}",
                            page_file.display(),
                            url
                        );
                        continue;
                    }
                    attempts += 1;

                    let file_name = asset_file_name(&url);
                    let local = match self.download(&url, &dir.join(&file_name)).await {
                        Ok(()) => {
                            outcome.downloaded += 1;
                            Some(format!("{}/{}", local_href(&dir_name), file_name))
                        }
                        Err(e) => {
                            outcome.failed += 1;
                            tracing::debug!("Asset download failed: {}", e);
                            None
                        }
                    };
                    resolved.insert(key, local.clone());
                    local
                }
            };

            if let Some(local) = local {
                replacements.push(Replacement::new(attr, local));
            }
        }

        outcome.html = splice(html, replacements);
        outcome
    }

    async fn download(&self, url: &Url, dest: &Path) -> Result<(), AssetError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|source| AssetError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| AssetError::Request {
            url: url.to_string(),
            source,
        })?;

        let io_error = |source| AssetError::Io {
            path: dest.to_path_buf(),
            source,
        };
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(dest, &bytes).await.map_err(io_error)?;

        tracing::trace!("Saved asset {} ({} bytes)", url, bytes.len());
        Ok(())
    }
}

/// The attribute holding the asset reference, if the tag is an asset
fn asset_attribute(tag: &Tag) -> Option<&Attribute> {
    match tag.name.as_str() {
        "img" => tag.attr("src"),
        "link" if is_stylesheet(tag) => tag.attr("href"),
        _ => None,
    }
}

fn is_stylesheet(tag: &Tag) -> bool {
    tag.attr("rel")
        .map(|rel| {
            rel.value
                .to_ascii_lowercase()
                .split_whitespace()
                .any(|token| token == "stylesheet")
        })
        .unwrap_or(false)
}

/// Resolves an absolute, scheme-relative or origin-relative reference
///
/// Document-relative references return `None`; they already point next to
/// the page on the origin, not into the local tree.
fn resolve_asset(raw: &str, site: &CanonicalUrl) -> Option<Url> {
    let raw = raw.trim();

    let mut url = if raw.starts_with("//") {
        Url::parse(&format!("{}:{}", site.scheme(), raw)).ok()?
    } else if raw.starts_with('/') {
        site.as_url().join(raw).ok()?
    } else {
        Url::parse(raw).ok()?
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    url.set_fragment(None);
    Some(url)
}

/// `<sha256-prefix>.<ext>` for an asset URL
fn asset_file_name(url: &Url) -> String {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));

    let extension = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

    format!("{}.{}", &digest[..16], extension)
}
