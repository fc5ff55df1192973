//! Sumi-Ingest main entry point
//!
//! This is the command-line interface for the Sumi-Ingest crawl-and-ingest
//! pipeline and its index engine boundary.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use sumi_ingest::config::{load_config_with_hash, Config};
use sumi_ingest::crawler::run_crawl;
use sumi_ingest::protocol::{check_health, EngineProcess, QueryClient};
use sumi_ingest::store::verify_store;
use tracing_subscriber::EnvFilter;

/// Sumi-Ingest: a polite crawl-and-ingest pipeline
///
/// Sumi-Ingest crawls a site breadth-first while respecting robots.txt,
/// stores every page as a numbered document with a manifest of source URLs,
/// and drives an external index engine through its build CLI and query socket.
#[derive(Parser, Debug)]
#[command(name = "sumi-ingest")]
#[command(version = "1.0.0")]
#[command(about = "A polite crawl-and-ingest pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Clear documents and manifest left by a previous run before crawling
    #[arg(long, conflicts_with_all = ["dry_run", "verify", "build", "query", "health"])]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["verify", "build", "query", "health"])]
    dry_run: bool,

    /// Check the store directory against its manifest and exit
    #[arg(long, conflicts_with_all = ["dry_run", "build", "query", "health"])]
    verify: bool,

    /// Build the index over the store directory and exit
    #[arg(long, conflicts_with_all = ["dry_run", "verify", "query", "health"])]
    build: bool,

    /// Send one query to the running query server and print the results
    #[arg(long, value_name = "TERM", conflicts_with_all = ["dry_run", "verify", "build", "health"])]
    query: Option<String>,

    /// Report whether the index artifacts exist and the query server is up
    #[arg(long, conflicts_with_all = ["dry_run", "verify", "build", "query"])]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.verify {
        handle_verify(&config)?;
    } else if cli.build {
        handle_build(&config).await?;
    } else if let Some(term) = cli.query.as_deref() {
        handle_query(&config, term).await?;
    } else if cli.health {
        handle_health(&config).await?;
    } else {
        handle_crawl(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_ingest=info,warn"),
            1 => EnvFilter::new("sumi_ingest=debug,info"),
            2 => EnvFilter::new("sumi_ingest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Ingest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max visits: {}", config.crawler.max_visits);
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nPoliteness:");
    println!(
        "  Unavailable robots.txt: {:?}",
        config.politeness.on_policy_unavailable
    );
    println!(
        "  Respect Crawl-delay: {}",
        config.politeness.respect_crawl_delay
    );
    println!(
        "  Crawl-delay ceiling: {}ms",
        config.politeness.max_crawl_delay_ms
    );

    println!("\nStore:");
    println!("  Directory: {}", config.store.directory.display());
    println!("  Manifest: {}", config.store.manifest_path().display());
    println!("  Manifest mode: {:?}", config.store.manifest_mode);

    println!("\nEngine:");
    println!("  Binary: {}", config.engine.binary.display());
    println!(
        "  Artifact directory: {}",
        config.engine.artifact_directory.display()
    );
    println!("  Query server: {}:{}", config.query.host, config.query.port);

    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --verify mode: checks the store against its manifest
fn handle_verify(config: &Config) -> anyhow::Result<()> {
    let report = verify_store(&config.store.directory, &config.store.manifest_file)
        .with_context(|| format!("Failed to verify {}", config.store.directory.display()))?;

    println!("Documents:        {}", report.documents);
    println!("Manifest entries: {}", report.manifest_entries);
    for name in &report.missing_files {
        println!("  missing file:   {}", name);
    }
    for name in &report.unlisted_files {
        println!("  not in manifest: {}", name);
    }
    for gap in &report.id_gaps {
        if gap.start() == gap.end() {
            println!("  missing id:     {}", gap.start());
        } else {
            println!("  missing ids:    {}-{}", gap.start(), gap.end());
        }
    }

    if !report.is_consistent() {
        bail!("Store is inconsistent with its manifest");
    }
    println!("✓ Store is consistent");
    Ok(())
}

/// Handles the --build mode: runs the engine build over the store directory
async fn handle_build(config: &Config) -> anyhow::Result<()> {
    let engine = EngineProcess::from_config(&config.engine);
    match engine.build(&config.store.directory).await {
        Ok(artifacts) => {
            println!("✓ Index built:");
            println!("  {}", artifacts.index.display());
            println!("  {}", artifacts.manifest.display());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Index build failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the --query mode: one request against the query server
async fn handle_query(config: &Config, term: &str) -> anyhow::Result<()> {
    let client = QueryClient::from_config(&config.query);
    let response = client
        .query(term)
        .await
        .with_context(|| format!("Query '{}' against {} failed", term, client.address()))?;

    println!("{} results for '{}':", response.count, response.query);
    for result in &response.results {
        println!("  {}", result);
    }
    Ok(())
}

/// Handles the --health mode
async fn handle_health(config: &Config) -> anyhow::Result<()> {
    let engine = EngineProcess::from_config(&config.engine);
    let client = QueryClient::from_config(&config.query);
    let report = check_health(&engine, &client).await;

    println!("Index artifacts present: {}", report.artifacts_present);
    println!("Query server accepting:  {}", report.server_accepting);

    if !report.is_ready() {
        bail!("Index engine is not ready");
    }
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (clearing previous documents)");
    }
    tracing::info!("Total seed URLs: {}", config.crawler.seeds.len());

    match run_crawl(config, fresh).await {
        Ok(report) => {
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
