//! Per-run politeness records
//!
//! A record is created the first time an origin is seen and lives for the
//! rest of the run. There is no expiry: a run is short enough that a policy
//! fetched at its start is still current at its end.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Where a cached policy came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    /// robots.txt was fetched and parsed
    Fetched,
    /// robots.txt could not be obtained; the configured fallback stands in
    Fallback { reason: String },
}

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content (or the fallback verdict)
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,

    pub source: PolicySource,
}

impl CachedRobots {
    /// Creates a record for a successfully fetched policy
    pub fn fetched(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
            source: PolicySource::Fetched,
        }
    }

    /// Creates a record standing in for an unavailable policy
    pub fn fallback(content: ParsedRobots, reason: impl Into<String>) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
            source: PolicySource::Fallback {
                reason: reason.into(),
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, PolicySource::Fallback { .. })
    }

    /// Checks if a URL is allowed according to the cached robots.txt
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.content.is_allowed(url, user_agent)
    }

    /// Gets the crawl delay from the cached robots.txt
    ///
    /// A declared delay too large to represent as a `Duration` saturates to
    /// `Duration::MAX`; callers bound it with their own ceiling.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.content
            .crawl_delay(user_agent)
            .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }
}
