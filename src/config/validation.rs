use crate::config::types::{
    Config, CrawlerConfig, EngineConfig, QueryConfig, StoreConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Smallest timeout accepted for any network operation (milliseconds)
const MIN_TIMEOUT_MS: u64 = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_store_config(&config.store)?;
    validate_engine_config(&config.engine)?;
    validate_query_config(&config.query)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_visits < 1 {
        return Err(ConfigError::Validation(format!(
            "max_visits must be >= 1, got {}",
            config.max_visits
        )));
    }

    if config.fetch_timeout_ms < MIN_TIMEOUT_MS {
        return Err(ConfigError::Validation(format!(
            "fetch_timeout_ms must be >= {}ms, got {}ms",
            MIN_TIMEOUT_MS, config.fetch_timeout_ms
        )));
    }

    if let Some(connect) = config.connect_timeout_ms {
        if connect < MIN_TIMEOUT_MS {
            return Err(ConfigError::Validation(format!(
                "connect_timeout_ms must be >= {}ms, got {}ms",
                MIN_TIMEOUT_MS, connect
            )));
        }
    }

    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates document store configuration
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "store directory cannot be empty".to_string(),
        ));
    }

    // The manifest lives inside the store directory; a path here would escape it
    if config.manifest_file.is_empty()
        || config.manifest_file.contains('/')
        || config.manifest_file.contains('\\')
    {
        return Err(ConfigError::Validation(format!(
            "manifest_file must be a plain file name, got '{}'",
            config.manifest_file
        )));
    }

    if config.manifest_file.starts_with("doc_") {
        return Err(ConfigError::Validation(format!(
            "manifest_file '{}' collides with document file names",
            config.manifest_file
        )));
    }

    Ok(())
}

/// Validates engine configuration
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.binary.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "engine binary cannot be empty".to_string(),
        ));
    }

    if config.build_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "build_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates query socket configuration
fn validate_query_config(config: &QueryConfig) -> Result<(), ConfigError> {
    if config.host.is_empty() {
        return Err(ConfigError::Validation(
            "query host cannot be empty".to_string(),
        ));
    }

    if config.port == 0 {
        return Err(ConfigError::Validation(
            "query port must be between 1 and 65535".to_string(),
        ));
    }

    if config.connect_timeout_ms < MIN_TIMEOUT_MS || config.read_timeout_ms < MIN_TIMEOUT_MS {
        return Err(ConfigError::Validation(format!(
            "query timeouts must be >= {}ms",
            MIN_TIMEOUT_MS
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
