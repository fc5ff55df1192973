//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings and timeouts
//! - GET requests to fetch page content
//! - Redirect handling
//! - Error classification
//!
//! Every URL gets exactly one attempt per run. Failures are returned to the
//! ingest loop, which records them and moves on. Redirects are never followed
//! here: the target is handed back so it goes through the politeness gate and
//! the frontier like any discovered link.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::url::resolve_url;
use reqwest::{redirect::Policy, Client};
use thiserror::Error;
use url::Url;

/// Why a single page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Unusable redirect from {url} to '{location}'")]
    BadRedirect { url: String, location: String },

    #[error("Unsupported content type '{content_type}' at {url}")]
    UnsupportedContent { url: String, content_type: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    fn from_reqwest(url: &Url, e: reqwest::Error) -> Self {
        let url = url.to_string();
        if e.is_timeout() {
            FetchError::Timeout { url }
        } else if e.is_connect() {
            FetchError::Connect {
                url,
                message: e.to_string(),
            }
        } else {
            FetchError::Transport {
                url,
                message: e.to_string(),
            }
        }
    }
}

/// How a fetched body is turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    PlainText,
}

impl ContentKind {
    /// Classifies a Content-Type header value
    ///
    /// A missing header is treated as HTML. Non-text media types return `None`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        if mime.is_empty() || mime.contains("html") {
            Some(ContentKind::Html)
        } else if mime.starts_with("text/") {
            Some(ContentKind::PlainText)
        } else {
            None
        }
    }
}

/// Result of a single fetch attempt that reached the server
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// 2xx response with an ingestible body
    Page(RawPage),

    /// 3xx response; `location` is the normalized redirect target
    Redirect { url: Url, location: Url },
}

/// Raw response for one successfully fetched URL
#[derive(Debug, Clone)]
pub struct RawPage {
    /// The URL that was requested (the frontier key); relative links
    /// resolve against it
    pub url: Url,

    pub status_code: u16,

    pub content_type: String,

    pub kind: ContentKind,

    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// The same client serves page and robots.txt requests, so both share the
/// configured timeouts.
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(crawler.fetch_timeout())
        .connect_timeout(crawler.connect_timeout())
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL once, without following redirects
///
/// # Returns
///
/// * `Ok(FetchOutcome::Page)` - 2xx response with a text body
/// * `Ok(FetchOutcome::Redirect)` - 3xx response carrying a usable `Location`
/// * `Err(FetchError)` - Non-success status, transport failure, timeout, an
///   unusable redirect target, or a media type that cannot be ingested
pub async fn fetch_page(client: &Client, url: &Url) -> Result<FetchOutcome, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    let status = response.status();
    if status.is_redirection() {
        if let Some(location) = response.headers().get(reqwest::header::LOCATION) {
            let location = location.to_str().unwrap_or("").to_string();
            return match resolve_url(url, &location) {
                Ok(target) => Ok(FetchOutcome::Redirect {
                    url: url.clone(),
                    location: target,
                }),
                Err(_) => Err(FetchError::BadRedirect {
                    url: url.to_string(),
                    location,
                }),
            };
        }
    }

    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let kind = ContentKind::from_content_type(&content_type).ok_or_else(|| {
        FetchError::UnsupportedContent {
            url: url.to_string(),
            content_type: content_type.clone(),
        }
    })?;

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    Ok(FetchOutcome::Page(RawPage {
        url: url.clone(),
        status_code: status.as_u16(),
        content_type,
        kind,
        body,
    }))
}
