//! Inference configuration

use crate::error::{PlacementError, Result};
use serde::{Deserialize, Serialize};

/// Default placement cutoff, shared by evaluation and single-case prediction
pub const DEFAULT_THRESHOLD: f64 = 0.59;

/// Attribution backend used by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AttributionMethod {
    /// Exact path-dependent TreeSHAP
    TreeShap,
    /// Seeded permutation sampling against the training mean
    Sampling { n_permutations: usize, seed: u64 },
}

impl Default for AttributionMethod {
    fn default() -> Self {
        AttributionMethod::TreeShap
    }
}

/// Configuration for model inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Threshold for the placement decision (`p >= threshold`)
    pub threshold: f64,

    /// How contributions are computed
    pub attribution: AttributionMethod,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            attribution: AttributionMethod::default(),
        }
    }
}

impl InferenceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set decision threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set attribution backend
    pub fn with_attribution(mut self, attribution: AttributionMethod) -> Self {
        self.attribution = attribution;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PlacementError::ConfigError(format!(
                "threshold must lie in [0, 1], got {}",
                self.threshold
            )));
        }
        if let AttributionMethod::Sampling { n_permutations, .. } = self.attribution {
            if n_permutations == 0 {
                return Err(PlacementError::ConfigError(
                    "sampling attribution needs at least 1 permutation".to_string(),
                ));
            }
        }
        Ok(())
    }
}
