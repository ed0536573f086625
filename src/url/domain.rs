use super::CanonicalUrl;

/// Returns true if `url` belongs to the crawled site
///
/// A URL is in scope when it shares the seed's host and port. The scheme is
/// ignored, so a site that moves from `http` to `https` through a redirect
/// keeps its pages in scope.
pub fn is_in_scope(url: &CanonicalUrl, site: &CanonicalUrl) -> bool {
    url.authority() == site.authority()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_origin_in_scope() {
        let site = CanonicalUrl::parse("https://ex.com").unwrap();
        let page = CanonicalUrl::parse("https://ex.com/a/b").unwrap();
        assert!(is_in_scope(&page, &site));
    }

    #[test]
    fn test_other_host_out_of_scope() {
        let site = CanonicalUrl::parse("https://ex.com").unwrap();
        assert!(!is_in_scope(&CanonicalUrl::parse("https://other.com/a").unwrap(), &site));
        assert!(!is_in_scope(&CanonicalUrl::parse("https://sub.ex.com/a").unwrap(), &site));
    }

    #[test]
    fn test_port_matters() {
        let site = CanonicalUrl::parse("http://127.0.0.1:4000").unwrap();
        assert!(is_in_scope(&CanonicalUrl::parse("http://127.0.0.1:4000/x").unwrap(), &site));
        assert!(!is_in_scope(&CanonicalUrl::parse("http://127.0.0.1:4001/x").unwrap(), &site));
    }

    #[test]
    fn test_scheme_is_ignored() {
        let site = CanonicalUrl::parse("http://ex.com").unwrap();
        assert!(is_in_scope(&CanonicalUrl::parse("https://ex.com/x").unwrap(), &site));

        let site = CanonicalUrl::parse("http://127.0.0.1:4000").unwrap();
        assert!(is_in_scope(&CanonicalUrl::parse("https://127.0.0.1:4000/x").unwrap(), &site));
    }
}
