//! Configuration for Wacast

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Messaging provider configuration
    pub provider: ProviderConfig,

    /// Worker pool configuration
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database backend: "postgres"
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Database URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_db_backend() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Messaging provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the provider API
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Bearer token used for provider API calls
    pub access_token: String,

    /// Request timeout in seconds
    ///
    /// Must stay below the retry backoff floor so a hung call cannot
    /// outlive its own retry window.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_base_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_provider_timeout() -> u64 {
    20
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum concurrent task executions
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Batch size for claiming due jobs
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Interval between queue polls (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum send retries per message record
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,

    /// Base delay for exponential retry backoff (seconds)
    #[serde(default = "default_retry_base")]
    pub retry_base_secs: i64,

    /// Jobs stuck in processing longer than this are released
    /// back to pending (seconds)
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval(),
            max_retries: default_max_retries(),
            retry_base_secs: default_retry_base(),
            stale_after_secs: default_stale_after(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_batch_size() -> i64 {
    100
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_retries() -> i32 {
    3
}

fn default_retry_base() -> i64 {
    30
}

fn default_stale_after() -> i64 {
    300
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/wacast/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_config() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.concurrency, 10);
        assert_eq!(worker.max_retries, 3);
        assert_eq!(worker.poll_interval_secs, 5);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
backend = "postgres"
url = "postgres://localhost/wacast"

[provider]
access_token = "EAAG-test-token"
timeout_secs = 10

[worker]
concurrency = 4
max_retries = 5
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.backend, "postgres");
        assert_eq!(config.provider.timeout_secs, 10);
        assert_eq!(
            config.provider.base_url,
            "https://graph.facebook.com/v19.0"
        );
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.worker.max_retries, 5);
        assert_eq!(config.logging.level, "info");
    }
}
