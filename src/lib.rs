//! Placement - student placement prediction with per-feature explanations
//!
//! This crate fits and serves a small prediction-and-explanation pipeline:
//! - Standard scaling with parameters learned once at fitting time
//! - A random forest with balanced class weights
//! - A single configurable decision threshold (default 0.59)
//! - Exact TreeSHAP attributions keyed by field name
//!
//! # Modules
//!
//! ## Core
//! - [`features`] - Versioned feature schema and named feature vectors
//! - [`preprocessing`] - Standard scaler
//! - [`training`] - Decision trees, random forest, splitting, reports, `Trainer`
//! - [`explainability`] - TreeSHAP and sampling attributors, contribution summaries
//! - [`inference`] - Request validation, threshold policy, `PlacementPipeline`
//!
//! ## Plumbing
//! - [`export`] - Artifact save/load with schema checks
//! - [`utils`] - CSV dataset loading
//! - [`config`] - JSON configuration file
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod features;
pub mod preprocessing;
pub mod training;
pub mod explainability;
pub mod inference;

// Plumbing
pub mod export;
pub mod utils;
pub mod config;

// Services
pub mod cli;

pub use error::{ErrorKind, PlacementError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ErrorKind, PlacementError, Result};

    // Features
    pub use crate::features::{FeatureSchema, FeatureVector, FieldSpec, PLACEMENT_FEATURES};

    // Preprocessing
    pub use crate::preprocessing::StandardScaler;

    // Training
    pub use crate::training::{
        ClassWeight, ClassificationReport, ForestParams, RandomForest, Trainer, TrainingConfig,
        TrainingOutcome,
    };

    // Explainability
    pub use crate::explainability::{
        Attribution, Attributor, ContributionSummary, SamplingAttributor, TreeShapAttributor,
    };

    // Inference
    pub use crate::inference::{
        InferenceConfig, PlacementPipeline, PredictionRequest, PredictionResponse, ThresholdPolicy,
        DEFAULT_THRESHOLD,
    };

    // Export
    pub use crate::export::{load_artifacts, save_artifacts};

    // Data loading
    pub use crate::utils::{DataLoader, Dataset};

    // Configuration
    pub use crate::config::PlacementConfig;
}
