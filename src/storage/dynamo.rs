//! DynamoDB feature table.
//!
//! Table schema:
//! - `geoHash`: partition key, coarse geohash (String)
//! - `featureId`: sort key, UUID (String)
//! - `name`: feature name (String)
//! - `latitude`, `longitude`: E7 coordinates (Number)
//! - `fullGeoHash`: fine geohash (String)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use backon::BackoffBuilder;
use tracing::{debug, info, warn};

use super::{FeatureEntity, FeatureTable, Result, StorageError};
use crate::utils::retry::batch_write_backoff;

const ATTR_GEO_HASH: &str = "geoHash";
const ATTR_FEATURE_ID: &str = "featureId";
const ATTR_NAME: &str = "name";
const ATTR_LATITUDE: &str = "latitude";
const ATTR_LONGITUDE: &str = "longitude";
const ATTR_FULL_GEO_HASH: &str = "fullGeoHash";

/// Largest batch DynamoDB accepts in a single `BatchWriteItem`.
pub const MAX_BATCH_SIZE: usize = 25;

type Item = HashMap<String, AttributeValue>;

/// DynamoDB implementation of FeatureTable.
pub struct DynamoFeatureTable {
    client: Client,
    table_name: String,
    closed: AtomicBool,
}

impl DynamoFeatureTable {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        let table_name = table_name.into();
        info!(table = %table_name, "Connected to DynamoDB feature table");
        Self {
            client,
            table_name,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn to_item(entity: FeatureEntity) -> Item {
        let mut item = HashMap::new();
        item.insert(ATTR_GEO_HASH.to_string(), AttributeValue::S(entity.geo_hash));
        item.insert(
            ATTR_FEATURE_ID.to_string(),
            AttributeValue::S(entity.feature_id),
        );
        item.insert(ATTR_NAME.to_string(), AttributeValue::S(entity.name));
        item.insert(
            ATTR_LATITUDE.to_string(),
            AttributeValue::N(entity.latitude.to_string()),
        );
        item.insert(
            ATTR_LONGITUDE.to_string(),
            AttributeValue::N(entity.longitude.to_string()),
        );
        item.insert(
            ATTR_FULL_GEO_HASH.to_string(),
            AttributeValue::S(entity.full_geo_hash),
        );
        item
    }

    fn from_item(item: &Item) -> Result<FeatureEntity> {
        Ok(FeatureEntity {
            geo_hash: required_string(item, ATTR_GEO_HASH)?,
            feature_id: required_string(item, ATTR_FEATURE_ID)?,
            name: optional_string(item, ATTR_NAME),
            latitude: required_i32(item, ATTR_LATITUDE)?,
            longitude: required_i32(item, ATTR_LONGITUDE)?,
            full_geo_hash: optional_string(item, ATTR_FULL_GEO_HASH),
        })
    }

    async fn write_batch(&self, requests: Vec<WriteRequest>) -> Result<()> {
        let mut delays = batch_write_backoff().build();
        let mut pending = requests;

        loop {
            let output = self
                .client
                .batch_write_item()
                .request_items(&self.table_name, pending)
                .send()
                .await
                .map_err(|e| {
                    StorageError::Unavailable(format!(
                        "DynamoDB batch_write_item failed: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;

            let unprocessed = output
                .unprocessed_items
                .and_then(|mut items| items.remove(&self.table_name))
                .unwrap_or_default();

            if unprocessed.is_empty() {
                return Ok(());
            }

            match delays.next() {
                Some(delay) => {
                    warn!(
                        table = %self.table_name,
                        unprocessed = unprocessed.len(),
                        delay_ms = delay.as_millis() as u64,
                        "Retrying unprocessed batch items"
                    );
                    tokio::time::sleep(delay).await;
                    pending = unprocessed;
                }
                None => {
                    return Err(StorageError::Unavailable(format!(
                        "{} items still unprocessed after retries",
                        unprocessed.len()
                    )));
                }
            }
        }
    }
}

fn required_string(item: &Item, attr: &str) -> Result<String> {
    match item.get(attr) {
        Some(AttributeValue::S(value)) => Ok(value.clone()),
        _ => Err(StorageError::Malformed(format!(
            "missing string attribute '{}'",
            attr
        ))),
    }
}

fn optional_string(item: &Item, attr: &str) -> String {
    match item.get(attr) {
        Some(AttributeValue::S(value)) => value.clone(),
        _ => String::new(),
    }
}

fn required_i32(item: &Item, attr: &str) -> Result<i32> {
    match item.get(attr) {
        Some(AttributeValue::N(value)) => value.parse::<i32>().map_err(|e| {
            StorageError::Malformed(format!("attribute '{}' is not an i32: {}", attr, e))
        }),
        _ => Err(StorageError::Malformed(format!(
            "missing number attribute '{}'",
            attr
        ))),
    }
}

#[async_trait]
impl FeatureTable for DynamoFeatureTable {
    async fn query_partition(&self, geo_hash: &str) -> Result<Vec<FeatureEntity>> {
        self.ensure_open()?;

        let mut entities = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#pk = :pk")
                .expression_attribute_names("#pk", ATTR_GEO_HASH)
                .expression_attribute_values(":pk", AttributeValue::S(geo_hash.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    StorageError::Unavailable(format!(
                        "DynamoDB query failed: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;

            for item in output.items.unwrap_or_default() {
                entities.push(Self::from_item(&item)?);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        debug!(geo_hash = %geo_hash, items = entities.len(), "Queried DynamoDB partition");
        Ok(entities)
    }

    async fn put(&self, entity: FeatureEntity) -> Result<()> {
        self.ensure_open()?;

        let feature_id = entity.feature_id.clone();
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::to_item(entity)))
            .send()
            .await
            .map_err(|e| {
                StorageError::Unavailable(format!(
                    "DynamoDB put_item failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!(feature_id = %feature_id, "Stored feature in DynamoDB");
        Ok(())
    }

    async fn batch_put(&self, entities: Vec<FeatureEntity>) -> Result<()> {
        self.ensure_open()?;

        let mut requests = Vec::with_capacity(entities.len());
        for entity in entities {
            let put = PutRequest::builder()
                .set_item(Some(Self::to_item(entity)))
                .build()
                .map_err(|e| StorageError::Malformed(e.to_string()))?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }

        for chunk in requests.chunks(MAX_BATCH_SIZE) {
            self.write_batch(chunk.to_vec()).await?;
        }
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<FeatureEntity>> {
        self.ensure_open()?;

        let mut entities = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    StorageError::Unavailable(format!(
                        "DynamoDB scan failed: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;

            for item in output.items.unwrap_or_default() {
                entities.push(Self::from_item(&item)?);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(entities)
    }

    fn close(&self) -> bool {
        let was_open = !self.closed.swap(true, Ordering::SeqCst);
        if was_open {
            info!(table = %self.table_name, "Closed DynamoDB feature table client");
        }
        was_open
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_round_trip_preserves_entity() {
        let entity = FeatureEntity {
            geo_hash: "dr5reg".to_string(),
            feature_id: "0b9f".to_string(),
            name: "Liberty Bell".to_string(),
            latitude: 399_496_000,
            longitude: -751_503_000,
            full_geo_hash: "dr5regw3".to_string(),
        };
        let item = DynamoFeatureTable::to_item(entity.clone());
        assert_eq!(
            item.get(ATTR_LATITUDE),
            Some(&AttributeValue::N("399496000".to_string()))
        );
        assert_eq!(DynamoFeatureTable::from_item(&item).unwrap(), entity);
    }

    #[test]
    fn test_from_item_tolerates_missing_name() {
        let mut item = DynamoFeatureTable::to_item(FeatureEntity {
            geo_hash: "dr5reg".to_string(),
            feature_id: "id".to_string(),
            name: "x".to_string(),
            latitude: 1,
            longitude: 2,
            full_geo_hash: String::new(),
        });
        item.remove(ATTR_NAME);
        assert_eq!(DynamoFeatureTable::from_item(&item).unwrap().name, "");
    }

    #[test]
    fn test_from_item_rejects_bad_number() {
        let mut item = HashMap::new();
        item.insert(ATTR_GEO_HASH.to_string(), AttributeValue::S("dr5reg".into()));
        item.insert(ATTR_FEATURE_ID.to_string(), AttributeValue::S("id".into()));
        item.insert(ATTR_LATITUDE.to_string(), AttributeValue::N("1.5".into()));
        item.insert(ATTR_LONGITUDE.to_string(), AttributeValue::N("2".into()));
        assert!(matches!(
            DynamoFeatureTable::from_item(&item),
            Err(StorageError::Malformed(_))
        ));
    }
}
