//! Inference module
//!
//! Single-case prediction and explanation against immutable fitted artifacts:
//! - Request validation by field name
//! - One threshold policy shared with the fitting-phase evaluation
//! - `PlacementPipeline`, safe to share across threads

mod config;
mod pipeline;
mod request;
mod threshold;

pub use config::{AttributionMethod, InferenceConfig, DEFAULT_THRESHOLD};
pub use pipeline::{PlacementPipeline, PredictionResponse};
pub use request::PredictionRequest;
pub use threshold::ThresholdPolicy;
