//! Configuration management for docbatch.
//!
//! Configuration is layered from three sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables take precedence over config file values, which take
//! precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use docbatch_engine::config::DocbatchConfig;
//!
//! // Load from file with env overrides
//! let config = DocbatchConfig::load("docbatch.yaml")?;
//!
//! // Or load from environment only
//! let config = DocbatchConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use docbatch_backend::HttpClientConfig;
use serde::{Deserialize, Serialize};

use crate::batching::{DecodeFailurePolicy, ExecutionMode};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct DocbatchConfig {
    /// Search backend settings
    #[serde(default)]
    pub backend: BackendSettings,

    /// Batching settings
    #[serde(default)]
    pub batching: BatchingSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Search backend connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BackendSettings {
    /// Base URL of the cluster
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Basic auth user name
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Timeout for one multi-get call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            username: None,
            password: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn to_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Batching and flush policy settings.
///
/// # Example YAML Configuration
///
/// ```yaml
/// batching:
///   max_batch_size: 100
///   flush_interval_ms: 5
///   queue_capacity: 1024
///   execution_mode: sequential
///   decode_failure: abort_group
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BatchingSettings {
    /// Flush once the open batch holds this many requests.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Flush this long after the first request of a batch arrived.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// Capacity of the intake queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// `sequential` or `concurrent`.
    #[serde(default)]
    pub execution_mode: ExecutionMode,

    /// `abort_group` or `isolate_document`.
    #[serde(default)]
    pub decode_failure: DecodeFailurePolicy,
}

impl Default for BatchingSettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            flush_interval_ms: default_flush_interval(),
            queue_capacity: default_queue_capacity(),
            execution_mode: ExecutionMode::default(),
            decode_failure: DecodeFailurePolicy::default(),
        }
    }
}

impl BatchingSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

fn default_max_batch_size() -> usize {
    100
}

fn default_flush_interval() -> u64 {
    5
}

fn default_queue_capacity() -> usize {
    1024
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl DocbatchConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `DOCBATCH_` and use `__` as
    /// separator, e.g. `DOCBATCH_BATCHING__MAX_BATCH_SIZE=50` overrides
    /// `batching.max_batch_size`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&DocbatchConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(environment())
            .build()?;

        let loaded: DocbatchConfig = config.try_deserialize()?;
        loaded.validate()?;

        Ok(loaded)
    }

    /// Load configuration from defaults and `DOCBATCH_` environment variables.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&DocbatchConfig::default())?)
            .add_source(environment())
            .build()?;

        let loaded: DocbatchConfig = config.try_deserialize()?;
        loaded.validate()?;

        Ok(loaded)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let url = self.backend.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(format!(
                "backend.url must start with http:// or https://, got: {}",
                self.backend.url
            )));
        }

        if self.backend.username.is_some() != self.backend.password.is_some() {
            return Err(invalid(
                "backend.username and backend.password must be set together".to_string(),
            ));
        }

        if self.backend.request_timeout_secs == 0 {
            return Err(invalid(
                "backend.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.batching.max_batch_size == 0 {
            return Err(invalid(
                "batching.max_batch_size must be greater than 0".to_string(),
            ));
        }

        if self.batching.flush_interval_ms == 0 {
            return Err(invalid(
                "batching.flush_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.batching.queue_capacity == 0 {
            return Err(invalid(
                "batching.queue_capacity must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "logging.level must be one of: {:?}, got: {}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}

// DOCBATCH_BATCHING__FLUSH_INTERVAL_MS -> batching.flush_interval_ms
fn environment() -> Environment {
    Environment::with_prefix("DOCBATCH")
        .prefix_separator("_")
        .separator("__")
}

fn invalid(message: String) -> ConfigLoadError {
    ConfigLoadError::Invalid { message }
}
