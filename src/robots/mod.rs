//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching
//! robots.txt files, and the [`PolitenessGate`] the ingest loop asks before
//! every fetch.

mod cache;
mod parser;

pub use cache::{CachedRobots, PolicySource};
pub use parser::ParsedRobots;

use crate::config::PolicyFallback;
use crate::url::{origin_of, robots_url};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// robots.txt could not be obtained for an origin
#[derive(Debug, Error)]
pub enum PolicyUnavailable {
    #[error("robots.txt for {origin} returned HTTP {status}")]
    Status { origin: String, status: u16 },

    #[error("robots.txt request for {origin} timed out")]
    Timeout { origin: String },

    #[error("robots.txt for {origin} could not be fetched: {message}")]
    Network { origin: String, message: String },

    #[error("cannot derive a robots.txt URL from {0}")]
    InvalidUrl(String),
}

/// Fetches robots.txt for the origin of `page_url`
///
/// Any non-success status is reported as unavailable; the caller decides
/// what an unavailable policy means.
///
/// # Returns
///
/// * `Ok(ParsedRobots)` - Successfully fetched robots.txt
/// * `Err(PolicyUnavailable)` - The policy could not be retrieved
pub async fn fetch_robots(client: &Client, page_url: &Url) -> Result<ParsedRobots, PolicyUnavailable> {
    let origin = origin_of(page_url);
    let robots = robots_url(page_url).ok_or_else(|| PolicyUnavailable::InvalidUrl(page_url.to_string()))?;

    let response = client.get(robots).send().await.map_err(|e| {
        if e.is_timeout() {
            PolicyUnavailable::Timeout {
                origin: origin.clone(),
            }
        } else {
            PolicyUnavailable::Network {
                origin: origin.clone(),
                message: e.to_string(),
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PolicyUnavailable::Status {
            origin,
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|e| PolicyUnavailable::Network {
        origin: origin.clone(),
        message: e.to_string(),
    })?;

    Ok(ParsedRobots::from_content(&body))
}

/// Answers allow/deny for candidate URLs, one robots.txt fetch per origin
///
/// The first URL seen for an origin triggers the fetch; the result (or the
/// configured fallback when the fetch fails) is cached for the rest of the
/// run.
pub struct PolitenessGate {
    client: Client,
    user_agent: String,
    fallback: PolicyFallback,
    records: HashMap<String, CachedRobots>,
}

impl PolitenessGate {
    /// Creates a gate
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests
    /// * `user_agent` - Product token matched against `User-agent` groups
    /// * `fallback` - Verdict used for origins whose robots.txt is unavailable
    pub fn new(client: Client, user_agent: impl Into<String>, fallback: PolicyFallback) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            fallback,
            records: HashMap::new(),
        }
    }

    /// Returns whether `url` may be fetched
    pub async fn is_allowed(&mut self, url: &Url) -> bool {
        let user_agent = self.user_agent.clone();
        let record = self.record_for(url).await;
        record.is_allowed(url.as_str(), &user_agent)
    }

    /// Returns the cached record for the origin of `url`, fetching it on first use
    pub async fn record_for(&mut self, url: &Url) -> &CachedRobots {
        let origin = origin_of(url);

        if !self.records.contains_key(&origin) {
            let record = match fetch_robots(&self.client, url).await {
                Ok(robots) => {
                    tracing::debug!("Fetched robots.txt for {}", origin);
                    CachedRobots::fetched(robots)
                }
                Err(e) => {
                    tracing::warn!("{}; applying fallback policy {:?}", e, self.fallback);
                    CachedRobots::fallback(self.fallback_policy(), e.to_string())
                }
            };
            self.records.insert(origin.clone(), record);
        }

        &self.records[&origin]
    }

    /// Crawl-delay declared for the origin of `url`, if its policy is cached
    pub fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        self.records
            .get(&origin_of(url))
            .and_then(|record| record.crawl_delay(&self.user_agent))
    }

    /// Number of origins with a cached policy
    pub fn origins_seen(&self) -> usize {
        self.records.len()
    }

    fn fallback_policy(&self) -> ParsedRobots {
        match self.fallback {
            PolicyFallback::Allow => ParsedRobots::allow_all(),
            PolicyFallback::Deny => ParsedRobots::deny_all(),
        }
    }
}
