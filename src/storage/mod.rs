//! Feature table storage.
//!
//! A feature table is a partitioned key-value store keyed by
//! `(geo_hash, feature_id)`. The repository layer derives the partition key
//! from coordinates and performs exact-match disambiguation; tables only
//! know how to read a partition, write entities and enumerate everything.
//!
//! # Implementations
//!
//! - `MemoryFeatureTable`: in-process table for local development and tests
//! - `DynamoFeatureTable`: DynamoDB table (`dynamo` feature)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field_mask::FieldMaskError;
use crate::geohash::GeohashError;
use crate::proto::{Feature, Point};

pub mod factory;
pub mod memory;

#[cfg(feature = "dynamo")]
pub mod dynamo;

pub use factory::{factory_for, InMemoryFactory, StoreClientFactory};
pub use memory::MemoryFeatureTable;

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoFeatureTable;
#[cfg(feature = "dynamo")]
pub use factory::{LocalDevelopmentFactory, ProductionFactory};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Feature not found at ({latitude}, {longitude})")]
    NotFound { latitude: i32, longitude: i32 },

    #[error("Feature table client has been closed")]
    Closed,

    #[error("Backing store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed stored item: {0}")]
    Malformed(String),

    #[error("Unsupported storage backend: {0}")]
    Unsupported(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(#[from] GeohashError),

    #[error("Invalid update mask: {0}")]
    InvalidMask(#[from] FieldMaskError),
}

/// Persisted form of a feature.
///
/// `geo_hash` is always the coarse geohash of `(latitude, longitude)`; it is
/// derived on creation and never set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEntity {
    /// Partition key: coarse geohash of the location.
    pub geo_hash: String,
    /// Sort key: unique feature identifier.
    pub feature_id: String,
    /// Feature name. Empty once cleared by an update.
    pub name: String,
    /// Latitude in E7 degrees.
    pub latitude: i32,
    /// Longitude in E7 degrees.
    pub longitude: i32,
    /// Fine geohash of the location, informational only.
    pub full_geo_hash: String,
}

impl FeatureEntity {
    /// Exact coordinate match, no tolerance.
    pub fn is_at(&self, point: &Point) -> bool {
        self.latitude == point.latitude && self.longitude == point.longitude
    }

    /// Wire view of this entity.
    pub fn to_feature(&self) -> Feature {
        Feature {
            name: self.name.clone(),
            location: Some(Point {
                latitude: self.latitude,
                longitude: self.longitude,
            }),
        }
    }
}

/// Interface for the backing feature table.
///
/// Tables are created by a [`StoreClientFactory`] at startup and shared for
/// the process lifetime. After [`FeatureTable::close`] every operation fails
/// with [`StorageError::Closed`]; tables never reconnect on their own.
#[async_trait]
pub trait FeatureTable: Send + Sync {
    /// All entities stored under a partition key.
    async fn query_partition(&self, geo_hash: &str) -> Result<Vec<FeatureEntity>>;

    /// Insert or overwrite an entity keyed by `(geo_hash, feature_id)`.
    async fn put(&self, entity: FeatureEntity) -> Result<()>;

    /// Insert or overwrite a batch of entities.
    ///
    /// Every entity is queryable once this returns `Ok`.
    async fn batch_put(&self, entities: Vec<FeatureEntity>) -> Result<()>;

    /// Every stored entity, in the table's enumeration order.
    async fn scan(&self) -> Result<Vec<FeatureEntity>>;

    /// Release the client. Returns `false` if it was already closed.
    fn close(&self) -> bool;

    /// Whether [`FeatureTable::close`] has been called.
    fn is_closed(&self) -> bool;
}
