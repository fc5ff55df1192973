use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Ingest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

/// Crawl loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of URLs dequeued in one run
    pub max_visits: u32,

    /// Total timeout for a single page or robots.txt request (milliseconds)
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Connect timeout for page requests (milliseconds); defaults to the fetch timeout
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,

    /// Minimum time between two requests to the same origin (milliseconds)
    #[serde(default)]
    pub request_delay_ms: u64,

    /// URLs the frontier is seeded with, in visit order
    pub seeds: Vec<String>,
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.unwrap_or(self.fetch_timeout_ms))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler, also the token matched against robots.txt groups
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the full header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// What the gate answers when a host's robots.txt cannot be obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyFallback {
    /// Fail open: treat the host as allowing everything
    #[default]
    Allow,
    /// Fail closed: treat the host as disallowing everything
    Deny,
}

/// Politeness configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolitenessConfig {
    #[serde(default)]
    pub on_policy_unavailable: PolicyFallback,

    /// Whether a robots.txt `Crawl-delay` may stretch the per-origin request delay
    #[serde(default = "default_true")]
    pub respect_crawl_delay: bool,

    /// Upper bound applied to any robots.txt `Crawl-delay`
    #[serde(default = "default_max_crawl_delay_ms")]
    pub max_crawl_delay_ms: u64,
}

impl PolitenessConfig {
    pub fn max_crawl_delay(&self) -> Duration {
        Duration::from_millis(self.max_crawl_delay_ms)
    }
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            on_policy_unavailable: PolicyFallback::default(),
            respect_crawl_delay: true,
            max_crawl_delay_ms: default_max_crawl_delay_ms(),
        }
    }
}

/// When the manifest file is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestMode {
    /// Once, when the run completes
    #[default]
    EndOfRun,
    /// After every persisted document
    Incremental,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Directory holding `doc_<n>.txt` files
    pub directory: PathBuf,

    /// Manifest file name, relative to the store directory
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    #[serde(default)]
    pub manifest_mode: ManifestMode,
}

impl StoreConfig {
    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(&self.manifest_file)
    }
}

/// External index engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Path to the engine executable
    #[serde(default = "default_engine_binary")]
    pub binary: PathBuf,

    /// Working directory of the engine, where `index.bin` and `manifest.bin` live
    #[serde(default = "default_artifact_directory")]
    pub artifact_directory: PathBuf,

    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,
}

impl EngineConfig {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_engine_binary(),
            artifact_directory: default_artifact_directory(),
            build_timeout_secs: default_build_timeout_secs(),
        }
    }
}

/// Query socket configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueryConfig {
    #[serde(default = "default_query_host")]
    pub host: String,

    #[serde(default = "default_query_port")]
    pub port: u16,

    #[serde(default = "default_query_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_query_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl QueryConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            host: default_query_host(),
            port: default_query_port(),
            connect_timeout_ms: default_query_connect_timeout_ms(),
            read_timeout_ms: default_query_read_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_crawl_delay_ms() -> u64 {
    60_000
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_manifest_file() -> String {
    "manifest.json".to_string()
}

fn default_engine_binary() -> PathBuf {
    PathBuf::from("./search_engine")
}

fn default_artifact_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_build_timeout_secs() -> u64 {
    600
}

fn default_query_host() -> String {
    "127.0.0.1".to_string()
}

fn default_query_port() -> u16 {
    9000
}

fn default_query_connect_timeout_ms() -> u64 {
    1_000
}

fn default_query_read_timeout_ms() -> u64 {
    5_000
}
