//! Per-origin request spacing
//!
//! The ingest loop is strictly FIFO, so spacing never reorders work: when the
//! next URL belongs to an origin that was requested too recently, the loop
//! simply waits out the remainder of the delay.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks the last request time of every origin
#[derive(Debug, Default)]
pub struct HostPacer {
    last_request: HashMap<String, Instant>,
}

impl HostPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a request to `origin` was just sent
    pub fn record_request(&mut self, origin: &str) {
        self.last_request.insert(origin.to_string(), Instant::now());
    }

    /// Time left before `origin` may be requested again
    ///
    /// # Returns
    ///
    /// * `None` - The origin can be requested now
    /// * `Some(wait)` - Remaining part of `delay` since the last request
    pub fn time_until_next_request(&self, origin: &str, delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request.get(origin)?;
        let Some(ready_at) = last.checked_add(delay) else {
            return Some(delay);
        };
        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Sleeps until `origin` may be requested again
    pub async fn wait_turn(&self, origin: &str, delay: Duration) {
        if let Some(wait) = self.time_until_next_request(origin, delay, Instant::now()) {
            tracing::debug!("Waiting {:?} before next request to {}", wait, origin);
            tokio::time::sleep(wait).await;
        }
    }
}

/// Calculates the delay between two requests to one origin
///
/// This takes the maximum of:
/// - The configured request delay
/// - The robots.txt crawl delay, when it is honoured, capped at `max_crawl_delay`
pub fn effective_delay(
    request_delay: Duration,
    crawl_delay: Option<Duration>,
    respect_crawl_delay: bool,
    max_crawl_delay: Duration,
) -> Duration {
    let robots_delay = match crawl_delay.filter(|_| respect_crawl_delay) {
        Some(delay) if delay > max_crawl_delay => {
            tracing::warn!(
                "Crawl-delay of {:?} exceeds the {:?} ceiling, using the ceiling",
                delay,
                max_crawl_delay
            );
            max_crawl_delay
        }
        Some(delay) => delay,
        None => Duration::ZERO,
    };

    std::cmp::max(request_delay, robots_delay)
}
