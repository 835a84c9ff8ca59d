use url::Url;

/// Extracts the lowercase host of a URL
///
/// The port is not part of the domain: `http://a.test:8080/` belongs to `a.test`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use regio_search::url::extract_domain;
///
/// let url = Url::parse("https://UIO.no:8443/forskning").unwrap();
/// assert_eq!(extract_domain(&url), Some("uio.no".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the last label of a domain (`"no"` for `"www.uio.no"`)
pub fn top_level_domain(domain: &str) -> Option<&str> {
    domain
        .rsplit('.')
        .next()
        .filter(|label| !label.is_empty() && domain.contains('.'))
}
