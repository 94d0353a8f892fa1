//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod pipeline;
mod server;
mod storage;

pub use pipeline::{HeaderConfig, LatencyConfig, LatencyTier, PipelineConfig};
pub use server::ServerConfig;
pub use storage::{
    StorageBackend, StorageConfig, DEFAULT_BATCH_SIZE, DEFAULT_FULL_PRECISION,
    DEFAULT_PARTITION_PRECISION, DEFAULT_TABLE_NAME,
};

use serde::Deserialize;
use thiserror::Error;

use crate::geohash::MAX_PRECISION;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ROUTEGUIDE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ROUTEGUIDE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "ROUTEGUIDE_LOG";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Request pipeline configuration.
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    ///
    /// The result is validated before it is returned.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let storage = &self.storage;
        if !(1..=MAX_PRECISION).contains(&storage.partition_precision) {
            return Err(ConfigError::Invalid(format!(
                "storage.partition_precision must be in 1..={MAX_PRECISION}, got {}",
                storage.partition_precision
            )));
        }
        if !(1..=MAX_PRECISION).contains(&storage.full_precision) {
            return Err(ConfigError::Invalid(format!(
                "storage.full_precision must be in 1..={MAX_PRECISION}, got {}",
                storage.full_precision
            )));
        }
        if storage.full_precision < storage.partition_precision {
            return Err(ConfigError::Invalid(format!(
                "storage.full_precision ({}) is coarser than storage.partition_precision ({})",
                storage.full_precision, storage.partition_precision
            )));
        }
        if !(1..=DEFAULT_BATCH_SIZE).contains(&storage.batch_size) {
            return Err(ConfigError::Invalid(format!(
                "storage.batch_size must be in 1..={DEFAULT_BATCH_SIZE}, got {}",
                storage.batch_size
            )));
        }
        if storage.table_name.is_empty() {
            return Err(ConfigError::Invalid("storage.table_name is empty".into()));
        }

        let headers = &self.pipeline.headers;
        if headers.enabled {
            http::HeaderName::from_bytes(headers.response_key.as_bytes()).map_err(|e| {
                ConfigError::Invalid(format!(
                    "pipeline.headers.response_key '{}': {e}",
                    headers.response_key
                ))
            })?;
            http::HeaderValue::from_str(&headers.response_value).map_err(|e| {
                ConfigError::Invalid(format!("pipeline.headers.response_value: {e}"))
            })?;
        }

        let latency = &self.pipeline.latency;
        let tier_total: u64 = latency.tiers.iter().map(|t| u64::from(t.percent)).sum();
        if tier_total > 100 {
            return Err(ConfigError::Invalid(format!(
                "pipeline.latency tier percents sum to {tier_total}, more than 100"
            )));
        }
        if latency.fault_percent > 100 {
            return Err(ConfigError::Invalid(format!(
                "pipeline.latency.fault_percent must be at most 100, got {}",
                latency.fault_percent
            )));
        }
        Ok(())
    }
}
