//! gRPC service implementations.

pub mod route;
pub mod route_guide;

pub use route::{record_route_stream, RouteRecorder, RouteState};
pub use route_guide::{Bounds, RouteGuideService};

use tonic::Status;
use tracing::{error, warn};

use crate::storage::StorageError;

/// Map storage errors to gRPC status.
///
/// `NotFound` only reaches here from UpdateFeature and is reported as
/// `InvalidArgument`, the same code as a malformed request.
pub fn map_storage_error(e: StorageError) -> Status {
    match e {
        StorageError::NotFound {
            latitude,
            longitude,
        } => {
            warn!(latitude, longitude, "No feature at update location");
            Status::invalid_argument("Feature not found at specified location")
        }
        StorageError::InvalidMask(e) => Status::invalid_argument(e.to_string()),
        StorageError::Closed => {
            warn!("Feature table used after close");
            Status::unavailable("Feature store is shut down")
        }
        StorageError::Unavailable(message) => {
            warn!(error = %message, "Feature store unavailable");
            Status::unavailable(format!("Feature store unavailable: {message}"))
        }
        e @ (StorageError::Malformed(_)
        | StorageError::Unsupported(_)
        | StorageError::InvalidCoordinates(_)) => {
            error!(error = %e, "Feature store error");
            Status::internal(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_mask::FieldMaskError;
    use crate::geohash::GeohashError;
    use tonic::Code;

    #[test]
    fn test_map_storage_error_codes() {
        let cases = [
            (
                StorageError::NotFound {
                    latitude: 1,
                    longitude: 2,
                },
                Code::InvalidArgument,
            ),
            (
                StorageError::InvalidMask(FieldMaskError::EmptyMask),
                Code::InvalidArgument,
            ),
            (StorageError::Closed, Code::Unavailable),
            (StorageError::Unavailable("down".into()), Code::Unavailable),
            (StorageError::Malformed("bad".into()), Code::Internal),
            (
                StorageError::InvalidCoordinates(GeohashError::LatitudeOutOfRange(91.0)),
                Code::Internal,
            ),
        ];

        for (error, code) in cases {
            assert_eq!(map_storage_error(error).code(), code);
        }
    }
}
