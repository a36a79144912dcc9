//! Feature schema and feature vectors
//!
//! The schema is the explicit contract between the fitting phase and inference:
//! it names every field, fixes their order and carries a version so fitted
//! artifacts can be checked against it when they are loaded.

mod schema;
mod vector;

pub use schema::{FeatureSchema, FieldSpec, PLACEMENT_FEATURES, PLACEMENT_SCHEMA_VERSION};
pub use vector::FeatureVector;
