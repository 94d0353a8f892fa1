//! Domain repositories.

mod feature;

pub use feature::{FeatureRepository, LoadSummary};
