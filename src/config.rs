//! Top-level configuration file

use crate::error::{PlacementError, Result};
use crate::inference::InferenceConfig;
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Training and inference settings, read from one JSON file.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub training: TrainingConfig,
    pub inference: InferenceConfig,
}

impl PlacementConfig {
    /// Read and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            PlacementError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            PlacementError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Override the decision threshold (no refit needed)
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.inference.threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.inference.validate()
    }
}
