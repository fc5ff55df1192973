//! URL handling module for Sumi-Ingest
//!
//! This module provides URL normalization (the crawl's dedup key), link
//! resolution against a page URL, and origin extraction for per-host
//! politeness state.

mod normalize;

pub use normalize::{normalize_url, resolve_url};

use url::Url;

/// Returns the origin (`scheme://host[:port]`) a URL belongs to
///
/// robots.txt is scoped per origin, so this is the key for politeness
/// records and request spacing.
///
/// # Examples
///
/// ```
/// use sumi_ingest::url::origin_of;
/// use url::Url;
///
/// let url = Url::parse("https://example.com:8443/a/b?c").unwrap();
/// assert_eq!(origin_of(&url), "https://example.com:8443");
/// ```
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Returns the robots.txt URL for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    url.join("/robots.txt").ok()
}
