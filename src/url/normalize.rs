use crate::UrlError;
use url::Url;

/// Normalizes a URL into the form used as the crawl's dedup key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Require a host
/// 4. Lowercase scheme and host, drop default ports, remove `.` and `..`
///    path segments, empty path becomes `/` (done by the parser)
/// 5. Remove the fragment
/// 6. Remove an empty query string (trailing `?`)
///
/// Paths keep their case and trailing slashes; `/docs` and `/docs/` are
/// distinct resources on most servers.
///
/// # Examples
///
/// ```
/// use sumi_ingest::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80/a/../b?#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/b");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Resolves `href` against `base` and normalizes the result
///
/// Relative references (`other`, `../up`, `/root`, `?q`, `#frag`) follow
/// RFC 3986 resolution. Links to non-HTTP schemes (`mailto:`,
/// `javascript:`, `data:`, ...) are rejected.
pub fn resolve_url(base: &Url, href: &str) -> Result<Url, UrlError> {
    let joined = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(joined)
}

fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}
