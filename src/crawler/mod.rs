//! Crawler module for web page fetching and processing
//!
//! This module contains the ingest pipeline:
//! - FIFO frontier with deduplication
//! - HTTP fetching with bounded timeouts, one attempt per URL
//! - Title, text and link extraction
//! - Per-origin request spacing
//! - The ingest loop tying them to the politeness gate and the store

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod scheduler;

pub use coordinator::{run_crawl, CrawlReport, Crawler};
pub use extractor::{collapse_whitespace, extract, extract_html, extract_plain, ExtractedPage, UNTITLED};
pub use fetcher::{build_http_client, fetch_page, ContentKind, FetchError, FetchOutcome, RawPage};
pub use frontier::Frontier;
pub use scheduler::{effective_delay, HostPacer};
