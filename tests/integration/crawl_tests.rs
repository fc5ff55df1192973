//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full ingest cycle end-to-end.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};
use sumi_ingest::config::{
    Config, CrawlerConfig, EngineConfig, ManifestMode, PolicyFallback, PolitenessConfig,
    QueryConfig, StoreConfig, UserAgentConfig,
};
use sumi_ingest::crawler::Crawler;
use sumi_ingest::store::{verify_store, Manifest, StoreError};
use sumi_ingest::IngestError;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling from `seed` into `store_dir`
fn create_test_config(seed: String, store_dir: &Path, max_visits: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_visits,
            fetch_timeout_ms: 2000,
            connect_timeout_ms: None,
            request_delay_ms: 0,
            seeds: vec![seed],
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        politeness: PolitenessConfig::default(),
        store: StoreConfig {
            directory: store_dir.to_path_buf(),
            manifest_file: "manifest.json".to_string(),
            manifest_mode: ManifestMode::EndOfRun,
        },
        engine: EngineConfig::default(),
        query: QueryConfig::default(),
    }
}

async fn mount_html(server: &MockServer, p: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/plain"))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_self_link_never_requeued() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(
        &server,
        "/",
        format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{base}/x">X</a>
            <a href="{base}/">Self</a>
            <a href="/">Self again</a>
            </body></html>"#
        ),
    )
    .await;
    mount_html(
        &server,
        "/x",
        r#"<html><head><title>X</title></head><body><a href="/">Home</a></body></html>"#.to_string(),
    )
    .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{base}/"), dir.path(), 20);
    let report = Crawler::new(config, false).unwrap().run().await.unwrap();

    assert_eq!(report.visited_urls, vec![format!("{base}/"), format!("{base}/x")]);
    assert_eq!(report.visited, 2);
    assert_eq!(report.persisted, 2);
    assert_eq!(report.frontier_remaining, 0);

    let manifest = Manifest::load(&dir.path().join("manifest.json")).unwrap();
    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest.source_of("doc_1.txt"), Some(format!("{base}/").as_str()));
    assert_eq!(manifest.source_of("doc_2.txt"), Some(format!("{base}/x").as_str()));

    let home = std::fs::read_to_string(dir.path().join("doc_1.txt")).unwrap();
    assert_eq!(home, "Home\n\nX Self Self again");
}

#[tokio::test]
async fn test_failed_fetch_does_not_consume_id() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        r#"<title>Home</title><a href="/missing">gone</a><a href="/ok">ok</a>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_html(&server, "/ok", "<title>OK</title><p>fine</p>".to_string()).await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{base}/"), dir.path(), 20);
    let report = Crawler::new(config, false).unwrap().run().await.unwrap();

    assert_eq!(report.visited, 3);
    assert_eq!(report.persisted, 2);
    assert_eq!(report.failed, 1);

    let manifest = Manifest::load(&dir.path().join("manifest.json")).unwrap();
    assert_eq!(manifest.source_of("doc_2.txt"), Some(format!("{base}/ok").as_str()));
    assert!(!dir.path().join("doc_3.txt").exists());

    let verify = verify_store(dir.path(), "manifest.json").unwrap();
    assert!(verify.is_consistent());
}

#[tokio::test]
async fn test_disallowed_url_never_fetched() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nDisallow: /private").await;
    mount_html(
        &server,
        "/",
        r#"<title>Home</title><a href="/private/a">secret</a><a href="/public">open</a>"#
            .to_string(),
    )
    .await;
    mount_html(&server, "/public", "<title>Public</title>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/private/a"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("secret", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{base}/"), dir.path(), 20);
    let report = Crawler::new(config, false).unwrap().run().await.unwrap();

    assert_eq!(report.visited, 3);
    assert_eq!(report.disallowed, 1);
    assert_eq!(report.persisted, 2);
}

#[tokio::test]
async fn test_unavailable_policy_fail_closed() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<title>Home</title>", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let mut config = create_test_config(format!("{base}/"), dir.path(), 20);
    config.politeness.on_policy_unavailable = PolicyFallback::Deny;
    let report = Crawler::new(config, false).unwrap().run().await.unwrap();

    assert_eq!(report.visited, 1);
    assert_eq!(report.disallowed, 1);
    assert_eq!(report.persisted, 0);

    let manifest = std::fs::read_to_string(dir.path().join("manifest.json")).unwrap();
    assert_eq!(manifest, "{}\n");
}

#[tokio::test]
async fn test_visit_cap_stops_with_nonempty_frontier() {
    let server = MockServer::start().await;
    let base = server.uri();

    let links: String = (1..=5)
        .map(|i| format!(r#"<a href="/p{i}">p{i}</a>"#))
        .collect();
    mount_html(&server, "/", format!("<title>Home</title>{links}")).await;
    for i in 1..=5 {
        mount_html(&server, &format!("/p{i}"), format!("<title>P{i}</title>")).await;
    }

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{base}/"), dir.path(), 3);
    let report = Crawler::new(config, false).unwrap().run().await.unwrap();

    assert_eq!(report.visited, 3);
    assert_eq!(report.persisted, 3);
    assert_eq!(report.frontier_remaining, 3);

    let unique: HashSet<_> = report.visited_urls.iter().collect();
    assert_eq!(unique.len(), report.visited_urls.len());
    assert_eq!(report.visited_urls[1], format!("{base}/p1"));
    assert_eq!(report.visited_urls[2], format!("{base}/p2"));
}

#[tokio::test]
async fn test_manifest_matches_store() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        r#"<title>Home</title><a href="a">a</a><a href="b/">b</a><a href="notes.txt">n</a>"#
            .to_string(),
    )
    .await;
    mount_html(&server, "/a", r#"<title>A</title><a href="b/c">c</a>"#.to_string()).await;
    mount_html(&server, "/b/", r#"<h1>B</h1><a href="../a">a</a>"#.to_string()).await;
    mount_html(&server, "/b/c", "<title>C</title>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("plain   notes", "text/plain"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let mut config = create_test_config(format!("{base}/"), dir.path(), 20);
    config.store.manifest_mode = ManifestMode::Incremental;
    let report = Crawler::new(config, false).unwrap().run().await.unwrap();

    assert_eq!(report.persisted, 5);

    let verify = verify_store(dir.path(), "manifest.json").unwrap();
    assert!(verify.is_consistent());
    assert_eq!(verify.documents, 5);
    assert_eq!(verify.manifest_entries, 5);

    let manifest = Manifest::load(&dir.path().join("manifest.json")).unwrap();
    let sources: HashSet<_> = manifest.entries().iter().map(|e| e.source.clone()).collect();
    assert_eq!(sources.len(), 5);

    let notes_file = manifest
        .entries()
        .iter()
        .find(|e| e.source.ends_with("/notes.txt"))
        .map(|e| e.file_name.clone())
        .unwrap();
    let notes = std::fs::read_to_string(dir.path().join(notes_file)).unwrap();
    assert_eq!(notes, "Untitled\n\nplain notes");
}

#[tokio::test]
async fn test_previous_run_requires_fresh() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/", "<title>Home</title>".to_string()).await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{base}/"), dir.path(), 5);
    Crawler::new(config.clone(), false).unwrap().run().await.unwrap();

    let second = Crawler::new(config.clone(), false);
    assert!(matches!(
        second,
        Err(IngestError::Store(StoreError::NotEmpty { documents: 1, .. }))
    ));

    let report = Crawler::new(config, true).unwrap().run().await.unwrap();
    assert_eq!(report.persisted, 1);
    assert!(verify_store(dir.path(), "manifest.json").unwrap().is_consistent());
}

#[tokio::test]
async fn test_redirect_targets_are_deduplicated() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(
        &server,
        "/",
        r#"<title>Home</title><a href="/a">a</a><a href="/b">b</a><a href="/c">c</a>"#.to_string(),
    )
    .await;
    for alias in ["/a", "/b"] {
        Mock::given(method("GET"))
            .and(path(alias))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/c"))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<title>C</title>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{base}/"), dir.path(), 20);
    let report = Crawler::new(config, false).unwrap().run().await.unwrap();

    assert_eq!(report.visited, 4);
    assert_eq!(report.redirected, 2);
    assert_eq!(report.persisted, 2);

    let manifest = Manifest::load(&dir.path().join("manifest.json")).unwrap();
    let sources: Vec<_> = manifest.entries().iter().map(|e| e.source.clone()).collect();
    assert_eq!(sources, vec![format!("{base}/"), format!("{base}/c")]);
}

#[tokio::test]
async fn test_redirect_into_disallowed_path_never_fetched() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nDisallow: /private").await;
    mount_html(&server, "/", r#"<title>Home</title><a href="/go">go</a>"#.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/private/secret"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<title>Secret</title>", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(format!("{base}/"), dir.path(), 20);
    let report = Crawler::new(config, false).unwrap().run().await.unwrap();

    assert_eq!(report.visited, 3);
    assert_eq!(report.redirected, 1);
    assert_eq!(report.disallowed, 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(report.visited_urls[2], format!("{base}/private/secret"));
}

#[tokio::test]
async fn test_huge_crawl_delay_is_capped() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nCrawl-delay: 1e300").await;
    mount_html(&server, "/", r#"<title>Home</title><a href="/next">next</a>"#.to_string()).await;
    mount_html(&server, "/next", "<title>Next</title>".to_string()).await;

    let dir = tempdir().unwrap();
    let mut config = create_test_config(format!("{base}/"), dir.path(), 20);
    config.politeness.max_crawl_delay_ms = 100;

    let started = Instant::now();
    let run = Crawler::new(config, false).unwrap().run();
    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("crawl should finish within the crawl-delay ceiling")
        .unwrap();

    assert_eq!(report.persisted, 2);
    assert!(started.elapsed() >= Duration::from_millis(100));
}
