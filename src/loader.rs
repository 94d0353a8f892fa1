//! Seed file loading.
//!
//! Reads the JSON feature database used to populate the feature table.
//! Two shapes are accepted:
//!
//! - `{"feature": [{"name": "...", "location": {"latitude": 1, "longitude": 2}}]}`
//! - a bare array of the same feature objects
//!
//! Missing fields take their protobuf defaults.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::proto::{Feature, Point};

/// Errors raised while reading a seed file.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read seed file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse seed data: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SeedPoint {
    latitude: i32,
    longitude: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SeedFeature {
    name: String,
    location: Option<SeedPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedFile {
    Database {
        #[serde(default)]
        feature: Vec<SeedFeature>,
    },
    List(Vec<SeedFeature>),
}

impl From<SeedFeature> for Feature {
    fn from(seed: SeedFeature) -> Self {
        Feature {
            name: seed.name,
            location: seed.location.map(|p| Point {
                latitude: p.latitude,
                longitude: p.longitude,
            }),
        }
    }
}

/// Parse seed JSON into features, unnamed entries included.
pub fn parse_seed(json: &str) -> Result<Vec<Feature>, LoaderError> {
    let seeds = match serde_json::from_str::<SeedFile>(json)? {
        SeedFile::Database { feature } => feature,
        SeedFile::List(list) => list,
    };
    Ok(seeds.into_iter().map(Feature::from).collect())
}

/// Read and parse a seed file.
pub fn read_seed_file(path: impl AsRef<Path>) -> Result<Vec<Feature>, LoaderError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let features = parse_seed(&json)?;
    info!(path = %path.display(), count = features.len(), "Read seed file");
    Ok(features)
}
