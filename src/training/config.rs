//! Training configuration

use super::random_forest::ForestParams;
use crate::error::{PlacementError, Result};
use serde::{Deserialize, Serialize};

/// Column holding the 0/1 placement label
pub const DEFAULT_TARGET_COLUMN: &str = "placement_status";

/// Configuration for the fitting phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Forest hyperparameters
    pub forest: ForestParams,
    /// Share of rows held out for evaluation
    pub test_size: f64,
    /// Seed for the train/test split
    pub split_seed: u64,
    /// Keep class ratios equal across the split
    pub stratify: bool,
    /// Label column name
    pub target_column: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            forest: ForestParams::default(),
            test_size: 0.2,
            split_seed: 42,
            stratify: true,
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set forest hyperparameters
    pub fn with_forest(mut self, forest: ForestParams) -> Self {
        self.forest = forest;
        self
    }

    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.forest.n_estimators = n;
        self
    }

    /// Set held-out share
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Set split seed
    pub fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = seed;
        self
    }

    /// Set label column
    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.forest.n_estimators == 0 {
            return Err(PlacementError::ConfigError(
                "forest.n_estimators must be at least 1".to_string(),
            ));
        }
        if self.forest.min_samples_split < 2 {
            return Err(PlacementError::ConfigError(
                "forest.min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.forest.min_samples_leaf == 0 {
            return Err(PlacementError::ConfigError(
                "forest.min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PlacementError::ConfigError(format!(
                "test_size must lie in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.target_column.trim().is_empty() {
            return Err(PlacementError::ConfigError(
                "target_column must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
