//! Feature table client factories.
//!
//! The backend is chosen once from configuration at startup; the resulting
//! factory is the only place that knows how to build a table client.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{FeatureTable, MemoryFeatureTable, Result};
use crate::config::{StorageBackend, StorageConfig};

#[cfg(not(feature = "dynamo"))]
use super::StorageError;

/// Produces a feature table client.
#[async_trait]
pub trait StoreClientFactory: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Build a new table client.
    async fn create(&self) -> Result<Arc<dyn FeatureTable>>;
}

/// Factory for the in-memory table.
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryFactory;

#[async_trait]
impl StoreClientFactory for InMemoryFactory {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self) -> Result<Arc<dyn FeatureTable>> {
        info!("Creating in-memory feature table");
        Ok(Arc::new(MemoryFeatureTable::new()))
    }
}

/// Production DynamoDB factory: default credential chain, configured region.
#[cfg(feature = "dynamo")]
#[derive(Debug, Clone)]
pub struct ProductionFactory {
    region: String,
    table_name: String,
}

#[cfg(feature = "dynamo")]
impl ProductionFactory {
    pub fn new(region: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            table_name: table_name.into(),
        }
    }
}

#[cfg(feature = "dynamo")]
#[async_trait]
impl StoreClientFactory for ProductionFactory {
    fn name(&self) -> &'static str {
        "production"
    }

    async fn create(&self) -> Result<Arc<dyn FeatureTable>> {
        info!(region = %self.region, "Creating production DynamoDB client");
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()))
            .load()
            .await;
        let client = aws_sdk_dynamodb::Client::new(&sdk_config);
        Ok(Arc::new(super::DynamoFeatureTable::new(
            client,
            self.table_name.clone(),
        )))
    }
}

/// Local development DynamoDB factory (DynamoDB Local, LocalStack).
///
/// Uses a fixed endpoint and static dummy credentials.
#[cfg(feature = "dynamo")]
#[derive(Debug, Clone)]
pub struct LocalDevelopmentFactory {
    endpoint: String,
    region: String,
    table_name: String,
}

#[cfg(feature = "dynamo")]
impl LocalDevelopmentFactory {
    pub fn new(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: region.into(),
            table_name: table_name.into(),
        }
    }
}

#[cfg(feature = "dynamo")]
#[async_trait]
impl StoreClientFactory for LocalDevelopmentFactory {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn create(&self) -> Result<Arc<dyn FeatureTable>> {
        info!(endpoint = %self.endpoint, "Creating local development DynamoDB client");
        let credentials = aws_sdk_dynamodb::config::Credentials::new(
            "dummy-key",
            "dummy-secret",
            None,
            None,
            "routeguide-local",
        );
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()))
            .endpoint_url(&self.endpoint)
            .credentials_provider(credentials)
            .load()
            .await;
        let client = aws_sdk_dynamodb::Client::new(&sdk_config);
        Ok(Arc::new(super::DynamoFeatureTable::new(
            client,
            self.table_name.clone(),
        )))
    }
}

/// Select the factory for the configured backend.
pub fn factory_for(config: &StorageConfig) -> Result<Box<dyn StoreClientFactory>> {
    let factory: Box<dyn StoreClientFactory> = match config.backend {
        StorageBackend::Memory => Box::new(InMemoryFactory),
        #[cfg(feature = "dynamo")]
        StorageBackend::Production => Box::new(ProductionFactory::new(
            config.region.clone(),
            config.table_name.clone(),
        )),
        #[cfg(feature = "dynamo")]
        StorageBackend::Local => Box::new(LocalDevelopmentFactory::new(
            config.endpoint.clone(),
            config.region.clone(),
            config.table_name.clone(),
        )),
        #[cfg(not(feature = "dynamo"))]
        StorageBackend::Production | StorageBackend::Local => {
            tracing::error!(backend = ?config.backend, "DynamoDB storage requested but 'dynamo' feature is not enabled");
            return Err(StorageError::Unsupported(format!(
                "{:?} backend requires the 'dynamo' feature",
                config.backend
            )));
        }
    };
    info!(factory = factory.name(), "Selected feature table factory");
    Ok(factory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_factory_creates_open_table() {
        let factory = factory_for(&StorageConfig::default()).unwrap();
        assert_eq!(factory.name(), "memory");
        let table = factory.create().await.unwrap();
        assert!(!table.is_closed());
        assert!(table.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_each_create_yields_independent_table() {
        let factory = InMemoryFactory;
        let first = factory.create().await.unwrap();
        let second = factory.create().await.unwrap();
        first.close();
        assert!(first.is_closed());
        assert!(!second.is_closed());
    }

    #[cfg(not(feature = "dynamo"))]
    #[test]
    fn test_dynamo_backend_without_feature_is_unsupported() {
        let config = StorageConfig {
            backend: StorageBackend::Local,
            ..StorageConfig::default()
        };
        assert!(matches!(
            factory_for(&config),
            Err(super::super::StorageError::Unsupported(_))
        ));
    }

    #[cfg(feature = "dynamo")]
    #[test]
    fn test_dynamo_backends_select_factories() {
        let local = StorageConfig {
            backend: StorageBackend::Local,
            ..StorageConfig::default()
        };
        assert_eq!(factory_for(&local).unwrap().name(), "local");

        let production = StorageConfig {
            backend: StorageBackend::Production,
            ..StorageConfig::default()
        };
        assert_eq!(factory_for(&production).unwrap().name(), "production");
    }
}
