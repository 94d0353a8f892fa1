//! In-memory feature table.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{FeatureEntity, FeatureTable, Result, StorageError};

/// Feature table held in process memory.
///
/// Entities are enumerated in insertion order; overwriting an entity keeps
/// its original position.
#[derive(Default)]
pub struct MemoryFeatureTable {
    entities: RwLock<Vec<FeatureEntity>>,
    closed: AtomicBool,
    fail_on_query: AtomicBool,
}

impl MemoryFeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make partition queries fail as if the store were unreachable.
    pub fn set_fail_on_query(&self, fail: bool) {
        self.fail_on_query.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn upsert(entities: &mut Vec<FeatureEntity>, entity: FeatureEntity) {
        match entities
            .iter_mut()
            .find(|e| e.geo_hash == entity.geo_hash && e.feature_id == entity.feature_id)
        {
            Some(existing) => *existing = entity,
            None => entities.push(entity),
        }
    }
}

#[async_trait]
impl FeatureTable for MemoryFeatureTable {
    async fn query_partition(&self, geo_hash: &str) -> Result<Vec<FeatureEntity>> {
        self.ensure_open()?;
        if self.fail_on_query.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "in-memory table configured to fail".to_string(),
            ));
        }
        let entities = self.entities.read().await;
        let partition: Vec<FeatureEntity> = entities
            .iter()
            .filter(|e| e.geo_hash == geo_hash)
            .cloned()
            .collect();
        debug!(geo_hash = %geo_hash, items = partition.len(), "Queried partition");
        Ok(partition)
    }

    async fn put(&self, entity: FeatureEntity) -> Result<()> {
        self.ensure_open()?;
        let mut entities = self.entities.write().await;
        Self::upsert(&mut entities, entity);
        Ok(())
    }

    async fn batch_put(&self, batch: Vec<FeatureEntity>) -> Result<()> {
        self.ensure_open()?;
        let mut entities = self.entities.write().await;
        for entity in batch {
            Self::upsert(&mut entities, entity);
        }
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<FeatureEntity>> {
        self.ensure_open()?;
        Ok(self.entities.read().await.clone())
    }

    fn close(&self) -> bool {
        let was_open = !self.closed.swap(true, Ordering::SeqCst);
        if was_open {
            info!("Closed in-memory feature table");
        }
        was_open
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
