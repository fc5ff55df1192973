//! Crawl frontier: FIFO work queue with deduplication
//!
//! URLs are keyed by their normalized form. A URL is either queued,
//! visited, or unknown; `enqueue` only accepts unknown URLs and `dequeue`
//! moves a URL from queued to visited. Breadth-first order falls out of FIFO
//! plus link expansion.

use std::collections::{HashSet, VecDeque};
use url::Url;

/// Ordered work queue of URLs pending visit
#[derive(Debug, Default)]
pub struct Frontier {
    /// URLs waiting to be visited, in discovery order
    queue: VecDeque<Url>,

    /// Keys of URLs currently in `queue`
    queued: HashSet<String>,

    /// Keys of URLs already dequeued, in visit order
    visited: Vec<String>,

    /// Same keys as `visited`, for lookups
    visited_set: HashSet<String>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a URL unless it has already been queued or visited
    ///
    /// The URL must already be normalized; see [`crate::url::normalize_url`].
    ///
    /// # Returns
    ///
    /// * `true` - The URL was added to the back of the queue
    /// * `false` - The URL was a duplicate and was ignored
    pub fn enqueue(&mut self, url: Url) -> bool {
        let key = url.as_str();
        if self.visited_set.contains(key) || self.queued.contains(key) {
            return false;
        }

        self.queued.insert(key.to_string());
        self.queue.push_back(url);
        true
    }

    /// Removes the earliest-enqueued URL and marks it visited
    ///
    /// A URL is visited from the moment it leaves the queue, whatever the
    /// outcome of its fetch.
    pub fn dequeue(&mut self) -> Option<Url> {
        let url = self.queue.pop_front()?;
        let key = url.as_str().to_string();

        self.queued.remove(&key);
        self.visited_set.insert(key.clone());
        self.visited.push(key);

        Some(url)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of URLs waiting to be visited
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Number of URLs dequeued so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited_set.contains(url.as_str())
    }

    /// Visited URLs in the order they were dequeued
    pub fn visited(&self) -> &[String] {
        &self.visited
    }
}
