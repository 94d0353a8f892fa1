//! RouteGuide - geohash-partitioned feature service
//!
//! A gRPC service that looks up named features by exact coordinate,
//! streams features inside a rectangle, summarises recorded routes and
//! applies field-mask scoped partial updates.

pub mod config;
pub mod field_mask;
pub mod geohash;
pub mod loader;
pub mod pipeline;
pub mod repository;
pub mod services;
pub mod storage;
pub mod transport;
pub mod utils;

pub mod proto {
    tonic::include_proto!("routeguide");
}
