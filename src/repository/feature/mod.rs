//! Feature repository.
//!
//! Derives the partition key from coordinates and disambiguates within the
//! partition by exact coordinate match.

use std::sync::Arc;

use prost_types::FieldMask;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{
    StorageConfig, DEFAULT_BATCH_SIZE, DEFAULT_FULL_PRECISION, DEFAULT_PARTITION_PRECISION,
};
use crate::field_mask::apply_mask;
use crate::geohash::{self, GeohashError};
use crate::proto::{Feature, Point};
use crate::storage::{FeatureEntity, FeatureTable, Result, StorageError};

/// Outcome of a bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Entities written to the table.
    pub written: usize,
    /// Input features skipped (unnamed, no location or out-of-range).
    pub skipped: usize,
    /// Batch writes issued.
    pub batches: usize,
}

/// Repository for feature lookups and updates.
///
/// Owns the table handle for the process lifetime; [`FeatureRepository::close`]
/// releases it.
pub struct FeatureRepository {
    table: Arc<dyn FeatureTable>,
    partition_precision: usize,
    full_precision: usize,
    batch_size: usize,
}

impl FeatureRepository {
    /// Create a repository with the default precisions and batch size.
    pub fn new(table: Arc<dyn FeatureTable>) -> Self {
        Self {
            table,
            partition_precision: DEFAULT_PARTITION_PRECISION,
            full_precision: DEFAULT_FULL_PRECISION,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Create a repository using the configured precisions and batch size.
    pub fn with_config(table: Arc<dyn FeatureTable>, config: &StorageConfig) -> Self {
        Self {
            table,
            partition_precision: config.partition_precision,
            full_precision: config.full_precision,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Partition key for a point.
    pub fn partition_key(&self, point: &Point) -> Result<String> {
        Ok(geohash::encode_e7(point, self.partition_precision)?)
    }

    /// Stored entity at exactly `point`, if any.
    ///
    /// Only the point's own partition is searched. A feature lying in an
    /// adjacent cell is never found, even when it is the closest one.
    pub async fn find_entity(&self, point: &Point) -> Result<Option<FeatureEntity>> {
        self.ensure_open()?;
        let geo_hash = match self.partition_key(point) {
            Ok(geo_hash) => geo_hash,
            Err(StorageError::InvalidCoordinates(e)) => {
                debug!(
                    latitude = point.latitude,
                    longitude = point.longitude,
                    error = %e,
                    "Point outside geohash range, nothing can be stored there"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let partition = self.table.query_partition(&geo_hash).await?;
        debug!(
            geo_hash = %geo_hash,
            candidates = partition.len(),
            "Scanning partition for exact match"
        );
        Ok(partition.into_iter().find(|entity| entity.is_at(point)))
    }

    /// Feature at exactly `point`, or an unnamed feature carrying `point`.
    pub async fn get_feature(&self, point: &Point) -> Result<Feature> {
        Ok(match self.find_entity(point).await? {
            Some(entity) => entity.to_feature(),
            None => Feature {
                name: String::new(),
                location: Some(Point {
                    latitude: point.latitude,
                    longitude: point.longitude,
                }),
            },
        })
    }

    /// Whether a named feature exists at exactly `point`.
    pub async fn has_feature(&self, point: &Point) -> Result<bool> {
        Ok(!self.get_feature(point).await?.name.is_empty())
    }

    /// Apply the masked fields of `feature` to the stored feature at its location.
    ///
    /// The whole entity is written back, so concurrent updates to the same
    /// feature are last-writer-wins.
    pub async fn update_feature(&self, feature: &Feature, mask: &FieldMask) -> Result<Feature> {
        let Some(location) = feature.location.as_ref() else {
            return Err(StorageError::NotFound {
                latitude: 0,
                longitude: 0,
            });
        };

        let mut entity = self
            .find_entity(location)
            .await?
            .ok_or(StorageError::NotFound {
                latitude: location.latitude,
                longitude: location.longitude,
            })?;

        apply_mask(&mut entity, feature, mask)?;
        self.table.put(entity.clone()).await?;

        info!(
            feature_id = %entity.feature_id,
            geo_hash = %entity.geo_hash,
            paths = ?mask.paths,
            "Updated feature"
        );
        Ok(entity.to_feature())
    }

    /// Every stored feature in table enumeration order.
    pub async fn list_features(&self) -> Result<Vec<Feature>> {
        let entities = self.table.scan().await?;
        debug!(count = entities.len(), "Listed features");
        Ok(entities.iter().map(FeatureEntity::to_feature).collect())
    }

    /// Build a new entity for a feature with a fresh identifier.
    ///
    /// Returns `Ok(None)` for unnamed features and features without a location.
    pub fn entity_for(
        &self,
        feature: &Feature,
    ) -> std::result::Result<Option<FeatureEntity>, GeohashError> {
        let location = match &feature.location {
            Some(location) if !feature.name.is_empty() => location,
            _ => return Ok(None),
        };
        Ok(Some(FeatureEntity {
            geo_hash: geohash::encode_e7(location, self.partition_precision)?,
            feature_id: Uuid::new_v4().to_string(),
            name: feature.name.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            full_geo_hash: geohash::encode_e7(location, self.full_precision)?,
        }))
    }

    /// Bulk-load features in batches.
    ///
    /// Every written entity is queryable once this returns `Ok`.
    pub async fn load(&self, features: Vec<Feature>) -> Result<LoadSummary> {
        self.ensure_open()?;
        let mut summary = LoadSummary::default();
        let mut entities = Vec::with_capacity(features.len());

        for feature in &features {
            match self.entity_for(feature) {
                Ok(Some(entity)) => entities.push(entity),
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    warn!(name = %feature.name, error = %e, "Skipping feature with invalid location");
                    summary.skipped += 1;
                }
            }
        }

        for chunk in entities.chunks(self.batch_size) {
            self.table.batch_put(chunk.to_vec()).await?;
            summary.batches += 1;
            summary.written += chunk.len();
            debug!(
                batch = summary.batches,
                items = chunk.len(),
                "Wrote feature batch"
            );
        }

        info!(
            written = summary.written,
            skipped = summary.skipped,
            batches = summary.batches,
            "Loaded features"
        );
        Ok(summary)
    }

    /// Release the table handle. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        self.table.close()
    }

    pub fn is_closed(&self) -> bool {
        self.table.is_closed()
    }

    /// Fails once closed, even for calls that would not reach the table.
    fn ensure_open(&self) -> Result<()> {
        if self.table.is_closed() {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}
