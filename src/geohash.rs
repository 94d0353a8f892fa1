//! Geohash encoding for partition keys.
//!
//! Maps a latitude/longitude pair onto a base-32 cell identifier. Each
//! character carries five bits; bits alternate between longitude and
//! latitude (longitude first), each bit halving the current interval.
//! A hash of length `n + 1` always starts with the hash of length `n`
//! for the same coordinates, so shorter hashes name coarser regions.

use thiserror::Error;

use crate::proto::Point;

/// Geohash alphabet (no `a`, `i`, `l`, `o`).
const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest supported hash, in characters.
pub const MAX_PRECISION: usize = 12;

/// Scale of E7 fixed-point coordinates.
pub const E7_SCALE: f64 = 10_000_000.0;

/// Errors that can occur during geohash encoding/decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeohashError {
    #[error("Latitude out of range [-90, 90]: {0}")]
    LatitudeOutOfRange(f64),

    #[error("Longitude out of range [-180, 180]: {0}")]
    LongitudeOutOfRange(f64),

    #[error("Precision must be between 1 and 12 characters, got {0}")]
    InvalidPrecision(usize),

    #[error("Invalid geohash character: {0:?}")]
    InvalidCharacter(char),
}

/// Cell covered by a geohash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Whether the coordinates fall inside this cell (edges inclusive).
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && (self.min_longitude..=self.max_longitude).contains(&longitude)
    }
}

/// Encode coordinates in degrees to a geohash of `precision` characters.
pub fn encode(latitude: f64, longitude: f64, precision: usize) -> Result<String, GeohashError> {
    if !(1..=MAX_PRECISION).contains(&precision) {
        return Err(GeohashError::InvalidPrecision(precision));
    }
    // Range checks also reject NaN.
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(GeohashError::LatitudeOutOfRange(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(GeohashError::LongitudeOutOfRange(longitude));
    }

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut is_longitude = true;
    let mut bits = 0;
    let mut index = 0usize;

    while hash.len() < precision {
        let (range, value) = if is_longitude {
            (&mut lon_range, longitude)
        } else {
            (&mut lat_range, latitude)
        };
        let mid = (range.0 + range.1) / 2.0;
        index <<= 1;
        if value >= mid {
            index |= 1;
            range.0 = mid;
        } else {
            range.1 = mid;
        }
        is_longitude = !is_longitude;

        bits += 1;
        if bits == 5 {
            hash.push(char::from(BASE32[index]));
            bits = 0;
            index = 0;
        }
    }

    Ok(hash)
}

/// Encode an E7 fixed-point point.
///
/// The conversion to degrees is lossy; the result is only meant for
/// partitioning, never for exact coordinate comparison.
pub fn encode_e7(point: &Point, precision: usize) -> Result<String, GeohashError> {
    encode(
        f64::from(point.latitude) / E7_SCALE,
        f64::from(point.longitude) / E7_SCALE,
        precision,
    )
}

/// Decode a geohash into the cell it covers.
pub fn decode_bounds(hash: &str) -> Result<BoundingBox, GeohashError> {
    let len = hash.chars().count();
    if !(1..=MAX_PRECISION).contains(&len) {
        return Err(GeohashError::InvalidPrecision(len));
    }

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut is_longitude = true;

    for c in hash.chars() {
        let lower = c.to_ascii_lowercase();
        let index = BASE32
            .iter()
            .position(|&b| char::from(b) == lower)
            .ok_or(GeohashError::InvalidCharacter(c))?;

        for shift in (0..5).rev() {
            let range = if is_longitude {
                &mut lon_range
            } else {
                &mut lat_range
            };
            let mid = (range.0 + range.1) / 2.0;
            if (index >> shift) & 1 == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            is_longitude = !is_longitude;
        }
    }

    Ok(BoundingBox {
        min_latitude: lat_range.0,
        max_latitude: lat_range.1,
        min_longitude: lon_range.0,
        max_longitude: lon_range.1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_vectors() {
        assert_eq!(encode(42.6, -5.6, 5).unwrap(), "ezs42");
        assert_eq!(encode(57.64911, 10.40744, 11).unwrap(), "u4pruydqqvj");
    }

    #[test]
    fn test_encode_is_prefix_refining() {
        let full = encode(40.9146138, -74.6188906, MAX_PRECISION).unwrap();
        for precision in 1..MAX_PRECISION {
            let coarse = encode(40.9146138, -74.6188906, precision).unwrap();
            assert_eq!(coarse.len(), precision);
            assert!(full.starts_with(&coarse));
        }
    }

    #[test]
    fn test_encode_e7_deterministic() {
        let point = Point {
            latitude: 409_146_138,
            longitude: -746_188_906,
        };
        let first = encode_e7(&point, 6).unwrap();
        let second = encode_e7(&point, 6).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 6);
        assert!(encode_e7(&point, 8).unwrap().starts_with(&first));
    }

    #[test]
    fn test_encode_extreme_corners() {
        assert_eq!(encode(-90.0, -180.0, 4).unwrap(), "0000");
        assert_eq!(encode(90.0, 180.0, 4).unwrap(), "zzzz");
    }

    #[test]
    fn test_encode_rejects_invalid_precision() {
        assert_eq!(encode(0.0, 0.0, 0), Err(GeohashError::InvalidPrecision(0)));
        assert_eq!(
            encode(0.0, 0.0, MAX_PRECISION + 1),
            Err(GeohashError::InvalidPrecision(13))
        );
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert!(matches!(
            encode(90.5, 0.0, 6),
            Err(GeohashError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            encode(0.0, -180.1, 6),
            Err(GeohashError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            encode(f64::NAN, 0.0, 6),
            Err(GeohashError::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_encode_e7_rejects_values_beyond_range() {
        let point = Point {
            latitude: i32::MAX,
            longitude: 0,
        };
        assert!(matches!(
            encode_e7(&point, 6),
            Err(GeohashError::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_decode_bounds_contains_encoded_point() {
        let hash = encode(57.64911, 10.40744, 8).unwrap();
        let bounds = decode_bounds(&hash).unwrap();
        assert!(bounds.contains(57.64911, 10.40744));
        assert!(bounds.max_latitude - bounds.min_latitude < 0.001);
    }

    #[test]
    fn test_decode_bounds_rejects_bad_input() {
        assert_eq!(decode_bounds(""), Err(GeohashError::InvalidPrecision(0)));
        assert_eq!(
            decode_bounds("ezsa2"),
            Err(GeohashError::InvalidCharacter('a'))
        );
    }
}
