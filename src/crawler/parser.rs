//! Tolerant HTML tag and attribute scanner
//!
//! This is not an HTML parser. It finds `<tag ...>` openings and their
//! attribute values, and reports the exact byte span of every value so that
//! callers can splice replacements into the original text. Markup around the
//! spans is never touched.
//!
//! Values may be double-quoted, single-quoted or unquoted. A stray quote
//! inside a tag does not stop the scan.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// An opening tag with its attribute list (the tag name is captured first)
#[allow(clippy::expect_used)]
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([a-zA-Z][a-zA-Z0-9]*)((?:[^>"']|"[^"]*"|'[^']*'|["'])*)>"#)
        .expect("tag regex is valid") // Static pattern, safe to panic
});

/// One `name=value` attribute inside a tag's attribute list
#[allow(clippy::expect_used)]
static ATTR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("attribute regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex is valid")
});

/// An attribute value found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercase attribute name
    pub name: String,

    /// The value exactly as written, without quotes
    pub value: String,

    /// Byte span of the value token in the document, quotes included
    pub span: Range<usize>,
}

impl Attribute {
    /// The value with the common character references decoded
    pub fn decoded(&self) -> String {
        decode_entities(&self.value)
    }
}

/// An opening tag found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Lowercase tag name
    pub name: String,

    /// Attributes with values, in document order
    pub attributes: Vec<Attribute>,
}

impl Tag {
    /// First attribute called `name` (lowercase)
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A new attribute value to splice into a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Span of the value token being replaced, quotes included
    pub span: Range<usize>,

    /// The new, unescaped value
    pub value: String,
}

impl Replacement {
    pub fn new(attribute: &Attribute, value: impl Into<String>) -> Self {
        Self {
            span: attribute.span.clone(),
            value: value.into(),
        }
    }
}

/// Scans `html` for opening tags named in `wanted` (lowercase)
///
/// # Example
///
/// ```
/// use sitebook::crawler::scan_tags;
///
/// let tags = scan_tags(r#"<p><A HREF='/a'>x</A><img src=b.png>"#, &["a", "img"]);
/// assert_eq!(tags.len(), 2);
/// assert_eq!(tags[0].attr("href").unwrap().value, "/a");
/// assert_eq!(tags[1].attr("src").unwrap().value, "b.png");
/// ```
pub fn scan_tags(html: &str, wanted: &[&str]) -> Vec<Tag> {
    let mut tags = Vec::new();

    for caps in TAG_PATTERN.captures_iter(html) {
        let (Some(name), Some(attrs)) = (caps.get(1), caps.get(2)) else {
            continue;
        };

        let name = name.as_str().to_ascii_lowercase();
        if !wanted.contains(&name.as_str()) {
            continue;
        }

        let offset = attrs.start();
        let attributes = ATTR_PATTERN
            .captures_iter(attrs.as_str())
            .filter_map(|a| {
                let attr_name = a.get(1)?.as_str().to_ascii_lowercase();
                let whole = a.get(0)?;
                let value = a.get(2).or_else(|| a.get(3)).or_else(|| a.get(4))?;
                // The value token runs to the end of the match, closing quote included
                let token_start = match (a.get(2), a.get(3)) {
                    (Some(v), _) | (None, Some(v)) => v.start() - 1,
                    (None, None) => value.start(),
                };
                Some(Attribute {
                    name: attr_name,
                    value: value.as_str().to_string(),
                    span: offset + token_start..offset + whole.end(),
                })
            })
            .collect();

        tags.push(Tag { name, attributes });
    }

    tags
}

/// Applies replacements to `html`, last span first
///
/// Every new value is written double-quoted with `&` and `"` escaped.
/// Overlapping replacements are dropped after the first one applied.
pub fn splice(html: &str, mut replacements: Vec<Replacement>) -> String {
    replacements.sort_by(|a, b| b.span.start.cmp(&a.span.start));

    let mut out = html.to_string();
    let mut limit = html.len();
    for replacement in replacements {
        if replacement.span.end > limit || replacement.span.start > replacement.span.end {
            tracing::trace!("Dropping overlapping replacement at {:?}", replacement.span);
            continue;
        }
        let quoted = format!("\"{}\"", escape_attribute(&replacement.value));
        out.replace_range(replacement.span.clone(), &quoted);
        limit = replacement.span.start;
    }
    out
}

/// Rewrites `<meta>` charset declarations to UTF-8
///
/// Fetched pages are decoded to UTF-8 text before they are saved, so any
/// other declared encoding would make a reader decode the file wrongly.
/// Both `<meta charset>` and the `http-equiv="Content-Type"` form are
/// handled.
///
/// # Example
///
/// ```
/// use sitebook::crawler::declare_utf8;
///
/// let html = r#"<meta charset=windows-1252><p>café</p>"#;
/// assert_eq!(declare_utf8(html), r#"<meta charset="utf-8"><p>café</p>"#);
/// ```
pub fn declare_utf8(html: &str) -> String {
    let mut replacements = Vec::new();

    for tag in scan_tags(html, &["meta"]) {
        if let Some(charset) = tag.attr("charset") {
            if !is_utf8_label(&charset.value) {
                replacements.push(Replacement::new(charset, "utf-8"));
            }
            continue;
        }

        let is_content_type = tag
            .attr("http-equiv")
            .is_some_and(|a| a.value.trim().eq_ignore_ascii_case("content-type"));
        let Some(content) = tag.attr("content").filter(|_| is_content_type) else {
            continue;
        };
        let declared = content.decoded().to_ascii_lowercase();
        let charset = declared
            .split_once("charset=")
            .map(|(_, label)| {
                label.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
            });
        if charset.is_some_and(|label| !is_utf8_label(label)) {
            replacements.push(Replacement::new(content, "text/html; charset=utf-8"));
        }
    }

    if replacements.is_empty() {
        return html.to_string();
    }
    splice(html, replacements)
}

fn is_utf8_label(label: &str) -> bool {
    let label = label.trim();
    label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8")
}

/// Extracts the text of the first `<title>` element
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_PATTERN
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .filter(|t| !t.is_empty())
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_quote_styles() {
        let html = r#"<a href="/d">1</a><a href='/s'>2</a><a href=/u>3</a>"#;
        let tags = scan_tags(html, &["a"]);
        let values: Vec<_> = tags
            .iter()
            .map(|t| t.attr("href").unwrap().value.as_str())
            .collect();
        assert_eq!(values, vec!["/d", "/s", "/u"]);
    }

    #[test]
    fn test_spans_cover_value_token() {
        let html = r#"<a class="x" href="/d">1</a><a href=/u>3</a>"#;
        let tags = scan_tags(html, &["a"]);

        let first = tags[0].attr("href").unwrap();
        assert_eq!(&html[first.span.clone()], "\"/d\"");

        let second = tags[1].attr("href").unwrap();
        assert_eq!(&html[second.span.clone()], "/u");
    }

    #[test]
    fn test_scan_ignores_unwanted_tags_and_lookalike_names() {
        let html = r#"<div href="/no"></div><a data-href="/no" href="/yes">"#;
        let tags = scan_tags(html, &["a"]);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].attr("href").unwrap().value, "/yes");
        assert_eq!(tags[0].attr("data-href").unwrap().value, "/no");
    }

    #[test]
    fn test_scan_quoted_gt_and_uppercase() {
        let html = r#"<A TITLE="a > b" HREF="/x">"#;
        let tags = scan_tags(html, &["a"]);
        assert_eq!(tags[0].attr("href").unwrap().value, "/x");
    }

    #[test]
    fn test_scan_value_inside_other_value_is_ignored() {
        let html = r#"<a title="see href=/fake" href="/real">"#;
        let tags = scan_tags(html, &["a"]);
        let hrefs: Vec<_> = tags[0]
            .attributes
            .iter()
            .filter(|a| a.name == "href")
            .collect();
        assert_eq!(hrefs.len(), 1);
        assert_eq!(hrefs[0].value, "/real");
    }

    #[test]
    fn test_splice_rewrites_in_place() {
        let html = r#"<a href='/a'>A</a> <a href=/b>B</a>"#;
        let tags = scan_tags(html, &["a"]);
        let replacements = vec![
            Replacement::new(tags[0].attr("href").unwrap(), "a.html"),
            Replacement::new(tags[1].attr("href").unwrap(), "b.html"),
        ];

        assert_eq!(
            splice(html, replacements),
            r#"<a href="a.html">A</a> <a href="b.html">B</a>"#
        );
    }

    #[test]
    fn test_splice_escapes_values() {
        let html = r#"<a href="/x">"#;
        let tags = scan_tags(html, &["a"]);
        let replacements = vec![Replacement::new(tags[0].attr("href").unwrap(), "a&b.html")];
        assert_eq!(splice(html, replacements), r#"<a href="a&amp;b.html">"#);
    }

    #[test]
    fn test_decoded_value() {
        let html = r#"<a href="/p?a=1&amp;b=2">"#;
        let tags = scan_tags(html, &["a"]);
        assert_eq!(tags[0].attr("href").unwrap().decoded(), "/p?a=1&b=2");
    }

    #[test]
    fn test_extract_title() {
        let html = "<html><head><TITLE> Intro &amp; Setup </TITLE></head></html>";
        assert_eq!(extract_title(html), Some("Intro & Setup".to_string()));
        assert_eq!(extract_title("<title></title>"), None);
    }

    #[test]
    fn test_declare_utf8_rewrites_other_charsets() {
        let html = concat!(
            r#"<head><META CHARSET='ISO-8859-1'>"#,
            r#"<meta http-equiv="Content-Type" content="text/html; charset=windows-1252">"#,
            r#"<meta name="viewport" content="width=device-width"></head>"#,
        );

        assert_eq!(
            declare_utf8(html),
            concat!(
                r#"<head><META CHARSET="utf-8">"#,
                r#"<meta http-equiv="Content-Type" content="text/html; charset=utf-8">"#,
                r#"<meta name="viewport" content="width=device-width"></head>"#,
            )
        );
    }

    #[test]
    fn test_declare_utf8_keeps_utf8_pages() {
        let html = concat!(
            r#"<meta charset="UTF-8">"#,
            r#"<meta http-equiv="content-type" content="text/html; charset=utf-8">"#,
        );
        assert_eq!(declare_utf8(html), html);
        assert_eq!(declare_utf8("<p>no meta</p>"), "<p>no meta</p>");
    }
}
