//! In-page link rewriting
//!
//! Anchors that point at pages of the crawled site are rewritten to the
//! local file name of their target, which turns the saved pages into a
//! navigable offline graph. The in-scope targets are returned so the caller
//! can enqueue them.

use crate::crawler::parser::{scan_tags, splice, Replacement};
use crate::url::{canonicalize, is_in_scope, local_href, to_local_path, CanonicalUrl};
use std::collections::HashSet;
use url::Url;

/// Tags whose `href` is a navigation link
const ANCHOR_TAGS: &[&str] = &["a", "area"];

/// Result of rewriting one page
#[derive(Debug, Clone, Default)]
pub struct RewriteOutcome {
    /// The page with in-scope anchors pointing at local files
    pub html: String,

    /// In-scope targets in document order, without duplicates
    pub discovered: Vec<CanonicalUrl>,

    /// Number of attributes rewritten
    pub rewritten: usize,
}

/// Rewrites the anchors of a page fetched from `page_url`
///
/// # Rules
///
/// - Each `<a href>` and `<area href>` value is canonicalized against the
///   page URL
/// - In-scope targets (same host and port as `site`, any scheme) are moved
///   onto the site's scheme, get the local file name of the target (any fragment of
///   the original link is kept) and are reported in `discovered`
/// - Out-of-scope and non-navigable links are left untouched
///
/// # Example
///
/// ```
/// use sitebook::crawler::rewrite_links;
/// use sitebook::url::CanonicalUrl;
/// use url::Url;
///
/// let site = CanonicalUrl::parse("https://ex.com").unwrap();
/// let page = Url::parse("https://ex.com/").unwrap();
/// let out = rewrite_links(r#"<a href="/guide/intro">Go</a>"#, &site, &page);
/// assert_eq!(out.html, r#"<a href="guide_intro.html">Go</a>"#);
/// assert_eq!(out.discovered[0].as_str(), "https://ex.com/guide/intro");
/// ```
pub fn rewrite_links(html: &str, site: &CanonicalUrl, page_url: &Url) -> RewriteOutcome {
    let mut replacements = Vec::new();
    let mut discovered = Vec::new();
    let mut seen = HashSet::new();

    for tag in scan_tags(html, ANCHOR_TAGS) {
        let Some(href) = tag.attr("href") else {
            continue;
        };

        let raw = href.decoded();
        let target = match canonicalize(&raw, site, page_url) {
            Ok(target) => target,
            Err(e) => {
                tracing::trace!("Leaving link '{}' untouched: {}", raw, e);
                continue;
            }
        };

        if !is_in_scope(&target, site) {
            continue;
        }
        // One key per page whichever scheme the link was written with
        let target = match target.rebased_on(site) {
            Ok(target) => target,
            Err(e) => {
                tracing::trace!("Leaving link '{}' untouched: {}", raw, e);
                continue;
            }
        };

        let file_name = to_local_path(&target, site.origin());
        let mut local = local_href(&file_name.to_string_lossy());
        if let Some(fragment) = raw.find('#').map(|i| &raw[i..]) {
            if fragment.len() > 1 {
                local.push_str(fragment);
            }
        }

        replacements.push(Replacement::new(href, local));
        if seen.insert(target.clone()) {
            discovered.push(target);
        }
    }

    let rewritten = replacements.len();
    RewriteOutcome {
        html: splice(html, replacements),
        discovered,
        rewritten,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> CanonicalUrl {
        CanonicalUrl::parse("https://ex.com").unwrap()
    }

    #[test]
    fn test_rewrites_in_scope_links() {
        let page = Url::parse("https://ex.com/guide/").unwrap();
        let html = r#"<a href="intro">I</a><a href="/a_b?x=1">AB</a><area href="../map">"#;

        let out = rewrite_links(html, &site(), &page);

        assert_eq!(
            out.html,
            r#"<a href="guide_intro.html">I</a><a href="a%255Fb.html">AB</a><area href="map.html">"#
        );
        assert_eq!(out.rewritten, 3);
        let found: Vec<_> = out.discovered.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            found,
            vec![
                "https://ex.com/guide/intro",
                "https://ex.com/a_b",
                "https://ex.com/map"
            ]
        );
    }

    #[test]
    fn test_leaves_out_of_scope_and_special_links() {
        let page = Url::parse("https://ex.com/").unwrap();
        let html = concat!(
            r##"<a href="https://other.org/x">o</a>"##,
            r##"<a href="mailto:me@ex.com">m</a>"##,
            r##"<a href="#top">t</a>"##,
            r##"<a href="javascript:void(0)">j</a>"##,
            r##"<a name="anchor">n</a>"##,
        );

        let out = rewrite_links(html, &site(), &page);

        assert_eq!(out.html, html);
        assert!(out.discovered.is_empty());
        assert_eq!(out.rewritten, 0);
    }

    #[test]
    fn test_keeps_fragment_and_dedups_targets() {
        let page = Url::parse("https://ex.com/").unwrap();
        let html = r#"<a href="/a#part">1</a><a href="/a">2</a><a href="/a/">3</a>"#;

        let out = rewrite_links(html, &site(), &page);

        assert_eq!(
            out.html,
            r#"<a href="a.html#part">1</a><a href="a.html">2</a><a href="a.html">3</a>"#
        );
        assert_eq!(out.discovered.len(), 1);
        assert_eq!(out.rewritten, 3);
    }

    #[test]
    fn test_root_link_maps_to_index() {
        let page = Url::parse("https://ex.com/a").unwrap();
        let out = rewrite_links(r#"<a href="/">home</a>"#, &site(), &page);
        assert_eq!(out.html, r#"<a href="index.html">home</a>"#);
    }

    #[test]
    fn test_site_redirected_to_https_stays_in_scope() {
        // The seed was http, the page was served from https after a redirect
        let site = CanonicalUrl::parse("http://ex.com").unwrap();
        let page = Url::parse("https://ex.com/guide/").unwrap();
        let html = concat!(
            r#"<a href="intro">1</a>"#,
            r#"<a href="https://ex.com/guide/intro">2</a>"#,
            r#"<a href="http://ex.com/x">3</a>"#,
            r#"<a href="https://ex.com:8443/y">4</a>"#,
        );

        let out = rewrite_links(html, &site, &page);

        assert_eq!(
            out.html,
            concat!(
                r#"<a href="guide_intro.html">1</a>"#,
                r#"<a href="guide_intro.html">2</a>"#,
                r#"<a href="x.html">3</a>"#,
                r#"<a href="https://ex.com:8443/y">4</a>"#,
            )
        );
        let found: Vec<_> = out.discovered.iter().map(|u| u.as_str()).collect();
        assert_eq!(found, vec!["http://ex.com/guide/intro", "http://ex.com/x"]);
    }
}
