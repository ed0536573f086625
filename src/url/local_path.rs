use super::CanonicalUrl;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// File stem used for the site root
pub const INDEX_STEM: &str = "index";

/// Separator that stands in for `/` in flattened names
pub const SEPARATOR: char = '_';

/// Extension given to every saved page
pub const PAGE_EXTENSION: &str = "html";

/// Longest stem kept verbatim; longer stems are shortened and hashed
const MAX_STEM_LEN: usize = 180;

/// Joins a shortened stem to its hash; escaped everywhere else
const SHORTENED_MARK: char = '~';

/// Maps a canonical URL to the file name of its saved page
///
/// # Mapping
///
/// 1. Remove the `scheme://host[:port]` prefix and a single leading `/`.
///    The scheme is not compared, so `http` and `https` variants of one page
///    share a name
/// 2. Escape `%` as `%25` and `_` as `%5F`
/// 3. Replace every `/` with `_`
/// 4. Map the empty result to `index`
/// 5. Append `.html`
///
/// Because the separator and the escape character are themselves escaped
/// before `/` is replaced, two distinct canonical URLs under the same origin
/// never share a name. `~` is escaped as `%7E` so that no flattened path
/// looks like a shortened one. A non-root path that would flatten to exactly `index`
/// is written `%69ndex`, which no other input can produce.
///
/// # Examples
///
/// ```
/// use sitebook::url::{to_local_path, CanonicalUrl};
///
/// let url = CanonicalUrl::parse("https://ex.com/guide/intro_1").unwrap();
/// let path = to_local_path(&url, "https://ex.com");
/// assert_eq!(path.to_str(), Some("guide_intro%5F1.html"));
/// ```
pub fn to_local_path(url: &CanonicalUrl, origin: &str) -> PathBuf {
    let rest = without_scheme(url.as_str())
        .strip_prefix(without_scheme(origin))
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        .unwrap_or_else(|| url.path());
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    PathBuf::from(format!("{}.{}", flatten(rest), PAGE_EXTENSION))
}

fn without_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

/// Turns a local file name into the relative reference written into a page
///
/// File names may contain `%` escapes, which a reader would decode, so `%`
/// itself is encoded. A name whose first segment contains `:` is prefixed
/// with `./` so it is not read as a URL scheme.
pub fn local_href(file_name: &str) -> String {
    let encoded = file_name.replace('%', "%25");
    let first_segment = encoded.split('/').next().unwrap_or_default();
    if first_segment.contains(':') {
        format!("./{}", encoded)
    } else {
        encoded
    }
}

/// Flattens a relative file path into a single injective file stem
///
/// Used to name rendered artifacts for pages discovered in a local tree.
/// Components are joined with `/` and then flattened exactly like URL paths.
pub fn flatten_relative(path: &Path) -> String {
    let joined = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    flatten(&joined)
}

/// Escapes and flattens a `/`-separated relative path into one file stem
fn flatten(rest: &str) -> String {
    if rest.is_empty() {
        return INDEX_STEM.to_string();
    }

    let mut stem = String::with_capacity(rest.len() + 8);
    for c in rest.chars() {
        match c {
            '%' => stem.push_str("%25"),
            SEPARATOR => stem.push_str("%5F"),
            SHORTENED_MARK => stem.push_str("%7E"),
            '/' => stem.push(SEPARATOR),
            other => stem.push(other),
        }
    }

    if stem == INDEX_STEM {
        return "%69ndex".to_string();
    }

    shorten(stem)
}

/// Keeps file names within common filesystem limits
fn shorten(stem: String) -> String {
    if stem.len() <= MAX_STEM_LEN {
        return stem;
    }

    let digest = hex::encode(Sha256::digest(stem.as_bytes()));
    let mut cut = MAX_STEM_LEN - 20;
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}{}", &stem[..cut], SHORTENED_MARK, &digest[..16])
}
