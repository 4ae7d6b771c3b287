//! Configuration management for BudgetWatch

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix of environment overrides, e.g. `BUDGETWATCH__HISTORY__BACKEND=file`
pub const ENV_PREFIX: &str = "BUDGETWATCH";

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Monitor configuration
    pub monitor: MonitorConfig,

    /// Notification history configuration
    pub history: HistoryConfig,

    /// Delivery configuration
    pub delivery: DeliveryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Window during which a repeat alert of the same kind is suppressed
    #[serde(with = "humantime_serde")]
    pub dedup_window: Duration,
    /// Interval between sweeps in watch mode
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    /// Budgets evaluated concurrently during a sweep
    pub sweep_concurrency: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_secs(3600),
            check_interval: Duration::from_secs(15 * 60),
            sweep_concurrency: 4,
        }
    }
}

/// Where notification history is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory only
    #[default]
    Memory,
    /// JSON files in a data directory
    File,
    /// Redis
    Redis,
}

/// Notification history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Key the history blob is stored under
    pub storage_key: String,
    /// Entries older than this are pruned
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
    /// Entry count above which a prune runs after each record
    pub soft_cap: usize,
    /// Storage backend
    pub backend: StorageBackend,
    /// Data directory for the file backend
    pub path: Option<PathBuf>,
    /// Redis URL for the redis backend
    pub redis_url: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            storage_key: "budget_notification_history".to_string(),
            max_age: Duration::from_secs(24 * 3600),
            soft_cap: 100,
            backend: StorageBackend::Memory,
            path: None,
            redis_url: None,
        }
    }
}

/// Delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Webhook receiving notifications; log-only delivery when unset
    pub webhook_url: Option<String>,
    /// HTTP request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Platform data directory for BudgetWatch
pub fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "budgetwatch", "budgetwatch")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.monitor.dedup_window, Duration::from_secs(3600));
        assert_eq!(config.history.max_age, Duration::from_secs(86_400));
        assert_eq!(config.history.soft_cap, 100);
        assert_eq!(config.history.backend, StorageBackend::Memory);
        assert!(config.delivery.webhook_url.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[monitor]
dedup_window = "30m"

[history]
backend = "file"
path = "/tmp/budgetwatch"

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.monitor.dedup_window, Duration::from_secs(1800));
        assert_eq!(config.monitor.check_interval, Duration::from_secs(900));
        assert_eq!(config.history.backend, StorageBackend::File);
        assert_eq!(config.history.path, Some(PathBuf::from("/tmp/budgetwatch")));
        assert_eq!(config.history.storage_key, "budget_notification_history");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = Config::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(result.is_err());
    }
}
