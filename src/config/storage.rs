//! Storage configuration types.

use serde::Deserialize;

/// Default partition key precision (~1.2km x 0.6km cells).
pub const DEFAULT_PARTITION_PRECISION: usize = 6;
/// Default precision of the informational full geohash.
pub const DEFAULT_FULL_PRECISION: usize = 8;
/// Default (and maximum) number of items per batch write.
pub const DEFAULT_BATCH_SIZE: usize = 25;
/// Default feature table name.
pub const DEFAULT_TABLE_NAME: &str = "RouteGuideFeatures";

/// Storage backend discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process table, nothing persisted.
    #[default]
    Memory,
    /// DynamoDB Local / LocalStack with static dummy credentials.
    Local,
    /// DynamoDB with the default AWS credential chain.
    Production,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend discriminator.
    pub backend: StorageBackend,
    /// DynamoDB table name.
    pub table_name: String,
    /// AWS region.
    pub region: String,
    /// Endpoint used by the `local` backend.
    pub endpoint: String,
    /// Geohash characters used for the partition key.
    pub partition_precision: usize,
    /// Geohash characters stored as `fullGeoHash`.
    pub full_precision: usize,
    /// Items per batch write during bulk load.
    pub batch_size: usize,
    /// Seed file loaded into the table at server startup.
    pub seed_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            region: "us-east-1".to_string(),
            endpoint: "http://localhost:8000".to_string(),
            partition_precision: DEFAULT_PARTITION_PRECISION,
            full_precision: DEFAULT_FULL_PRECISION,
            batch_size: DEFAULT_BATCH_SIZE,
            seed_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let storage = StorageConfig::default();
        assert_eq!(storage.backend, StorageBackend::Memory);
        assert_eq!(storage.table_name, "RouteGuideFeatures");
        assert_eq!(storage.partition_precision, 6);
        assert_eq!(storage.full_precision, 8);
        assert_eq!(storage.batch_size, 25);
        assert!(storage.seed_path.is_none());
    }
}
