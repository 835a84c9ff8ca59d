use crate::UrlError;
use url::Url;

/// Query parameters that only carry click-tracking data
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "msclkid", "_ga", "_hsenc"];

/// Normalizes a URL into the frontier deduplication key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host and strip a leading `www.`
/// 3. Collapse the path: drop `.`/empty segments, resolve `..`, drop the
///    trailing slash (the root stays `/`)
/// 4. Remove the fragment
/// 5. Remove tracking parameters (`utm_*` and [`TRACKING_PARAMS`]); every other
///    parameter is retained, sorted by key
///
/// The scheme and an explicit port are kept, so `http://a.test:8080/` and
/// `https://a.test/` are different frontier entries.
///
/// # Examples
///
/// ```
/// use regio_search::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.NO/side/?b=2&a=1#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.no/side?a=1&b=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(UrlError::MissingDomain)?
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = collapse_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    if url.query().is_some() {
        let params = retained_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    Ok(url)
}

/// Removes dot segments, repeated slashes and the trailing slash
fn collapse_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Returns the non-tracking query parameters sorted by key (stable for equal keys)
fn retained_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
