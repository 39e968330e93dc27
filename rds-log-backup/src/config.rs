//! Configuration management for the log backup tool.
//!
//! Loads configuration from TOML file with environment variable overrides.
//! Every field has a default so the tool runs without a config file.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `log.level`.
pub const LOG_LEVEL_ENV: &str = "RDS_LOG_BACKUP_LOG_LEVEL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Service name used in the credential scope and default host
    pub service: String,

    /// Endpoint override, e.g. `http://localhost:4566`
    pub endpoint: Option<String>,

    /// Whole-request timeout for one log download
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// S3 endpoint override for S3-compatible stores
    pub endpoint: Option<String>,

    /// Address buckets as `endpoint/bucket` rather than `bucket.endpoint`
    pub force_path_style: bool,
}

// Default values
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_service() -> String {
    "rds".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            endpoint: None,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise defaults, then apply the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|l| !l.is_empty()) {
            self.log.level = level;
        }
    }

    pub fn json_logs(&self) -> bool {
        self.log.format.eq_ignore_ascii_case("json")
    }
}
