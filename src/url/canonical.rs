use crate::UrlError;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use url::Url;

/// Link prefixes that never point at a crawlable page
const NON_NAVIGABLE_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// An absolute, canonical page URL
///
/// The canonical form is `scheme://host[:port]/path` with the fragment, the
/// query string and any trailing slash removed. The site root is written
/// without a slash (`https://example.com`). The canonical string is the only
/// key used for deduplication.
#[derive(Debug, Clone)]
pub struct CanonicalUrl {
    text: String,
    origin_len: usize,
    url: Url,
}

impl CanonicalUrl {
    /// Canonicalizes an already-absolute URL string
    ///
    /// # Examples
    ///
    /// ```
    /// use sitebook::url::CanonicalUrl;
    ///
    /// let url = CanonicalUrl::parse("https://ex.com/a/?x=1#y").unwrap();
    /// assert_eq!(url.as_str(), "https://ex.com/a");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let url = Url::parse(raw.trim()).map_err(map_parse_error)?;
        Self::from_url(&url)
    }

    /// Builds the canonical form of a parsed URL
    pub fn from_url(url: &Url) -> Result<Self, UrlError> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(UrlError::NotNavigable(format!("unsupported scheme '{}'", scheme)));
        }

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h,
            _ => return Err(UrlError::MissingHost),
        };

        let origin = match url.port() {
            Some(port) => format!("{}://{}:{}", scheme, host, port),
            None => format!("{}://{}", scheme, host),
        };

        // Url::path never carries the query or fragment, so only the
        // trailing slashes are left to strip. Stripping all of them keeps
        // canonicalization idempotent for paths like "/a//".
        let path = url.path().trim_end_matches('/');

        let text = format!("{}{}", origin, path);
        let url = Url::parse(&text).map_err(map_parse_error)?;

        Ok(Self {
            origin_len: origin.len(),
            text,
            url,
        })
    }

    /// The canonical string
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `scheme://host[:port]`
    pub fn origin(&self) -> &str {
        &self.text[..self.origin_len]
    }

    /// `host[:port]`, the origin without its scheme
    pub fn authority(&self) -> &str {
        &self.text[self.scheme().len() + "://".len()..self.origin_len]
    }

    /// The path part, empty for the site root
    pub fn path(&self) -> &str {
        &self.text[self.origin_len..]
    }

    /// The same path under the origin of `site`
    ///
    /// ```
    /// use sitebook::url::CanonicalUrl;
    ///
    /// let site = CanonicalUrl::parse("http://ex.com").unwrap();
    /// let page = CanonicalUrl::parse("https://ex.com/a").unwrap();
    /// assert_eq!(page.rebased_on(&site).unwrap().as_str(), "http://ex.com/a");
    /// ```
    pub fn rebased_on(&self, site: &CanonicalUrl) -> Result<Self, UrlError> {
        if self.origin() == site.origin() {
            return Ok(self.clone());
        }
        Self::parse(&format!("{}{}", site.origin(), self.path()))
    }

    /// The lowercase host name
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// The scheme (`http` or `https`)
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// The parsed form, suitable for requests and for joining relative links
    pub fn as_url(&self) -> &Url {
        &self.url
    }
}

impl PartialEq for CanonicalUrl {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for CanonicalUrl {}

impl Hash for CanonicalUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for CanonicalUrl {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalUrl {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for CanonicalUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonicalizes a raw link found on a page
///
/// # Resolution Rules
///
/// 1. Links starting with `/` resolve against the site origin (`//host/...`
///    takes the site's scheme)
/// 2. Other relative links resolve against the directory of the page that
///    contains them, with dot segments removed
/// 3. Query string and fragment are dropped
/// 4. Trailing slashes are dropped
///
/// Absolute `http(s)` links on other hosts pass through canonicalized; the
/// scope decision belongs to the caller.
///
/// # Arguments
///
/// * `raw` - The attribute value as written in the page
/// * `site` - The canonical seed URL, which supplies the origin
/// * `page` - The URL the containing page was fetched from
///
/// # Returns
///
/// * `Ok(CanonicalUrl)` - A navigable canonical URL
/// * `Err(UrlError)` - Empty, fragment-only, non-http(s) or hostless links
///
/// # Examples
///
/// ```
/// use sitebook::url::{canonicalize, CanonicalUrl};
/// use url::Url;
///
/// let site = CanonicalUrl::parse("https://ex.com").unwrap();
/// let page = Url::parse("https://ex.com/guide/").unwrap();
/// let link = canonicalize("intro.html#top", &site, &page).unwrap();
/// assert_eq!(link.as_str(), "https://ex.com/guide/intro.html");
/// ```
pub fn canonicalize(raw: &str, site: &CanonicalUrl, page: &Url) -> Result<CanonicalUrl, UrlError> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(UrlError::NotNavigable("empty link".to_string()));
    }

    if raw.starts_with('#') {
        return Err(UrlError::NotNavigable("fragment-only link".to_string()));
    }

    let lowered = raw.to_ascii_lowercase();
    if NON_NAVIGABLE_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return Err(UrlError::NotNavigable(raw.to_string()));
    }

    let resolved = if raw.starts_with("//") {
        Url::parse(&format!("{}:{}", site.scheme(), raw))
    } else if raw.starts_with('/') {
        site.as_url().join(raw)
    } else {
        match Url::parse(raw) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => page.join(raw),
            Err(e) => Err(e),
        }
    }
    .map_err(map_parse_error)?;

    CanonicalUrl::from_url(&resolved)
}

/// Number of non-empty path segments in a canonical URL
///
/// The site root has depth 0.
pub fn crawl_depth(url: &CanonicalUrl) -> u32 {
    url.path().split('/').filter(|s| !s.is_empty()).count() as u32
}

fn map_parse_error(e: url::ParseError) -> UrlError {
    match e {
        url::ParseError::EmptyHost => UrlError::MissingHost,
        other => UrlError::Parse(other.to_string()),
    }
}
