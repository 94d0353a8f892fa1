//! Field mask handling for features.
//!
//! Two independent policies over the paths `name`, `location`,
//! `location.latitude` and `location.longitude`:
//!
//! - [`project`] builds a read-side copy of a feature holding only the
//!   masked fields.
//! - [`apply_mask`] merges masked fields of a request feature into a
//!   stored entity. A field absent from the mask is never touched, even
//!   when the request carries a different value for it. Location paths are
//!   accepted but ignored: changing coordinates would change the partition
//!   key of the entity.

use prost_types::FieldMask;
use thiserror::Error;
use tracing::{debug, warn};

use crate::proto::{Feature, Point};
use crate::storage::FeatureEntity;

pub const NAME: &str = "name";
pub const LOCATION: &str = "location";
pub const LOCATION_LATITUDE: &str = "location.latitude";
pub const LOCATION_LONGITUDE: &str = "location.longitude";

/// Errors raised by the write merge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldMaskError {
    #[error("Field mask must contain at least one path")]
    EmptyMask,
}

/// A recognised (or unrecognised) mask path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskPath<'a> {
    Name,
    Location,
    LocationLatitude,
    LocationLongitude,
    Unknown(&'a str),
}

impl<'a> MaskPath<'a> {
    pub fn parse(path: &'a str) -> Self {
        match path {
            NAME => MaskPath::Name,
            LOCATION => MaskPath::Location,
            LOCATION_LATITUDE => MaskPath::LocationLatitude,
            LOCATION_LONGITUDE => MaskPath::LocationLongitude,
            other => MaskPath::Unknown(other),
        }
    }

    /// Whether the path targets the location or one of its coordinates.
    pub fn is_location(&self) -> bool {
        matches!(
            self,
            MaskPath::Location | MaskPath::LocationLatitude | MaskPath::LocationLongitude
        )
    }
}

/// Whether a mask is present and has at least one path.
pub fn is_set(mask: Option<&FieldMask>) -> bool {
    mask.is_some_and(|m| !m.paths.is_empty())
}

/// Project a feature onto the fields named by `mask`.
///
/// An absent or empty mask returns the feature unchanged. Unknown paths are
/// ignored; unlisted fields are left at their zero value.
pub fn project(feature: &Feature, mask: Option<&FieldMask>) -> Feature {
    let Some(mask) = mask.filter(|m| !m.paths.is_empty()) else {
        return feature.clone();
    };

    let mut projected = Feature::default();
    for path in &mask.paths {
        match MaskPath::parse(path) {
            MaskPath::Name => projected.name = feature.name.clone(),
            MaskPath::Location => {
                if let Some(location) = &feature.location {
                    projected.location = Some(Point {
                        latitude: location.latitude,
                        longitude: location.longitude,
                    });
                }
            }
            MaskPath::LocationLatitude => {
                if let Some(location) = &feature.location {
                    projected
                        .location
                        .get_or_insert_with(Point::default)
                        .latitude = location.latitude;
                }
            }
            MaskPath::LocationLongitude => {
                if let Some(location) = &feature.location {
                    projected
                        .location
                        .get_or_insert_with(Point::default)
                        .longitude = location.longitude;
                }
            }
            MaskPath::Unknown(path) => {
                debug!(path = %path, "Ignoring unknown field mask path in projection");
            }
        }
    }
    projected
}

/// Merge the masked fields of `source` into `target`, in mask order.
///
/// Setting `name` to an empty string clears it. Location paths and unknown
/// paths are logged and skipped.
pub fn apply_mask(
    target: &mut FeatureEntity,
    source: &Feature,
    mask: &FieldMask,
) -> Result<(), FieldMaskError> {
    if mask.paths.is_empty() {
        return Err(FieldMaskError::EmptyMask);
    }

    for path in &mask.paths {
        match MaskPath::parse(path) {
            MaskPath::Name => {
                debug!(
                    feature_id = %target.feature_id,
                    from = %target.name,
                    to = %source.name,
                    "Updating feature name"
                );
                target.name = source.name.clone();
            }
            p if p.is_location() => {
                warn!(
                    feature_id = %target.feature_id,
                    path = %path,
                    "Location updates not supported (would change partition key)"
                );
            }
            _ => {
                warn!(feature_id = %target.feature_id, path = %path, "Unknown field in mask");
            }
        }
    }
    Ok(())
}
