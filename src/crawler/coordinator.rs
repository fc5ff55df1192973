//! Crawler coordinator - the ingest loop
//!
//! A [`Crawler`] owns every piece of per-run state: the frontier (with its
//! visited set), the politeness gate, the document store with its id
//! counter and manifest. The loop is strictly sequential: one URL is
//! authorized, fetched, extracted and persisted before the next one is
//! dequeued.

use crate::config::Config;
use crate::crawler::extractor::extract;
use crate::crawler::fetcher::{build_http_client, fetch_page, FetchOutcome};
use crate::crawler::frontier::Frontier;
use crate::crawler::scheduler::{effective_delay, HostPacer};
use crate::robots::PolitenessGate;
use crate::store::{Document, DocumentStore};
use crate::url::{normalize_url, origin_of};
use crate::IngestError;
use std::fmt;
use std::time::Instant;
use url::Url;

/// Outcome of one ingest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// URLs dequeued, whatever their outcome
    pub visited: u32,

    /// Documents written to the store
    pub persisted: u64,

    /// URLs whose fetch, extraction or persistence failed
    pub failed: u32,

    /// URLs refused by the politeness gate
    pub disallowed: u32,

    /// URLs that answered with a redirect; their targets were queued as links
    pub redirected: u32,

    /// URLs still queued when the run ended
    pub frontier_remaining: usize,

    /// Visited URLs in visit order
    pub visited_urls: Vec<String>,
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Visited:    {}", self.visited)?;
        writeln!(f, "Persisted:  {}", self.persisted)?;
        writeln!(f, "Failed:     {}", self.failed)?;
        writeln!(f, "Disallowed: {}", self.disallowed)?;
        writeln!(f, "Redirected: {}", self.redirected)?;
        write!(f, "Remaining:  {}", self.frontier_remaining)
    }
}

/// What happened to one dequeued URL
#[derive(Debug)]
enum Visit {
    Persisted { links: usize },
    Redirected { queued: bool },
    Disallowed,
    Failed,
}

/// Main crawler structure
pub struct Crawler {
    config: Config,
    frontier: Frontier,
    gate: PolitenessGate,
    pacer: HostPacer,
    store: DocumentStore,
    client: reqwest::Client,
}

impl Crawler {
    /// Creates a crawler for one run
    ///
    /// Opens the document store (taking its run lock) and seeds the frontier
    /// with the normalized seed URLs.
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `fresh` - Whether documents from a previous run may be cleared
    pub fn new(config: Config, fresh: bool) -> Result<Self, IngestError> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;
        let gate = PolitenessGate::new(
            client.clone(),
            config.user_agent.crawler_name.clone(),
            config.politeness.on_policy_unavailable,
        );
        let store = DocumentStore::open(&config.store, fresh)?;

        let mut frontier = Frontier::new();
        for seed in &config.crawler.seeds {
            let url = normalize_url(seed)?;
            if !frontier.enqueue(url) {
                tracing::debug!("Duplicate seed {}", seed);
            }
        }

        Ok(Self {
            config,
            frontier,
            gate,
            pacer: HostPacer::new(),
            store,
            client,
        })
    }

    /// Runs the ingest loop until the frontier is empty or the visit cap is hit
    ///
    /// Errors for a single URL are logged and counted, never returned. Only
    /// a failure to write the final manifest fails the run.
    pub async fn run(mut self) -> Result<CrawlReport, IngestError> {
        let max_visits = self.config.crawler.max_visits;
        tracing::info!(
            "Starting crawl: {} seeds, visit cap {}",
            self.frontier.len(),
            max_visits
        );

        let started = Instant::now();
        let mut report = CrawlReport::default();

        while report.visited < max_visits {
            let Some(url) = self.frontier.dequeue() else {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            };
            report.visited += 1;

            match self.visit(&url).await {
                Visit::Persisted { links } => {
                    tracing::debug!("{} persisted, {} new links queued", url, links);
                }
                Visit::Redirected { queued } => {
                    report.redirected += 1;
                    if !queued {
                        tracing::debug!("Redirect target of {} already seen", url);
                    }
                }
                Visit::Disallowed => report.disallowed += 1,
                Visit::Failed => report.failed += 1,
            }

            if report.visited % 10 == 0 {
                let rate = report.visited as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON);
                tracing::info!(
                    "Progress: {} visited, {} persisted, {} in frontier, {:.2} pages/sec",
                    report.visited,
                    self.store.document_count(),
                    self.frontier.len(),
                    rate
                );
            }
        }

        if report.visited >= max_visits && !self.frontier.is_empty() {
            tracing::info!(
                "Visit cap of {} reached with {} URLs still queued",
                max_visits,
                self.frontier.len()
            );
        }

        self.store.finish()?;

        report.persisted = self.store.document_count();
        report.frontier_remaining = self.frontier.len();
        report.visited_urls = self.frontier.visited().to_vec();

        tracing::info!(
            "Crawl finished in {:?}: {} visited, {} persisted, {} failed, {} disallowed",
            started.elapsed(),
            report.visited,
            report.persisted,
            report.failed,
            report.disallowed
        );

        Ok(report)
    }

    /// Authorizes, fetches, extracts and persists one URL
    ///
    /// A redirect is not followed: its target joins the frontier and is
    /// authorized and deduplicated when its own turn comes.
    async fn visit(&mut self, url: &Url) -> Visit {
        if !self.gate.is_allowed(url).await {
            tracing::info!("URL {} disallowed by robots.txt", url);
            return Visit::Disallowed;
        }

        let origin = origin_of(url);
        let delay = effective_delay(
            self.config.crawler.request_delay(),
            self.gate.crawl_delay(url),
            self.config.politeness.respect_crawl_delay,
            self.config.politeness.max_crawl_delay(),
        );
        self.pacer.wait_turn(&origin, delay).await;
        self.pacer.record_request(&origin);

        let raw = match fetch_page(&self.client, url).await {
            Ok(FetchOutcome::Page(raw)) => raw,
            Ok(FetchOutcome::Redirect { location, .. }) => {
                tracing::info!("URL {} redirects to {}", url, location);
                return Visit::Redirected {
                    queued: self.frontier.enqueue(location),
                };
            }
            Err(e) => {
                tracing::warn!("{}", e);
                return Visit::Failed;
            }
        };

        let page = extract(&raw);
        let document = Document {
            source: url.clone(),
            title: page.title,
            body: page.text,
        };

        let key = match self.store.persist(&document) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("Failed to persist {}: {}", url, e);
                return Visit::Failed;
            }
        };

        if let Err(e) = self.store.record_manifest(&key, url) {
            tracing::warn!("Failed to update manifest for {}: {}", key.file_name(), e);
        }

        let mut queued = 0;
        for link in page.links {
            if self.frontier.enqueue(link) {
                queued += 1;
            }
        }

        Visit::Persisted { links: queued }
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }
}

/// Runs a complete ingest run
///
/// This is the main entry point for an ingest run. It will:
/// 1. Open the document store and take its run lock
/// 2. Seed the frontier
/// 3. Visit URLs in FIFO order until the frontier or the visit cap runs out
/// 4. Write the manifest
///
/// # Example
///
/// ```no_run
/// use sumi_ingest::config::load_config;
/// use sumi_ingest::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let report = run_crawl(config, false).await?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, fresh: bool) -> Result<CrawlReport, IngestError> {
    Crawler::new(config, fresh)?.run().await
}
