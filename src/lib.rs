//! Sumi-Ingest: a polite crawl-and-ingest pipeline
//!
//! This crate crawls a site breadth-first while respecting robots.txt,
//! persists every fetched page as a numbered document with a manifest of
//! source URLs, and talks to an external index engine through its build
//! CLI and its line-delimited JSON query socket.

pub mod config;
pub mod crawler;
pub mod protocol;
pub mod robots;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Ingest operations
///
/// Only errors that end an ingest run appear here. Per-URL failures are
/// counted in the run report, and the engine lifecycle reports through
/// `ProtocolError` and `BuildError` directly.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sumi-Ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlReport, Crawler};
pub use protocol::{EngineProcess, QueryClient};
pub use store::{DocumentStore, Manifest};
pub use crate::url::{normalize_url, origin_of};
