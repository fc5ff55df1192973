//! Integration tests for Sumi-Ingest
//!
//! Crawl scenarios run against wiremock servers; protocol scenarios run
//! against in-process TCP servers; build scenarios drive small shell-script
//! engines.

mod build_tests;
mod crawl_tests;
mod protocol_tests;
