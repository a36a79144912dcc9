//! Probability-to-decision cutoff

use super::config::DEFAULT_THRESHOLD;
use crate::error::{PlacementError, Result};
use serde::{Deserialize, Serialize};

/// Turns a placement probability into a decision: placed iff `p >= threshold`.
///
/// The fitting phase evaluates with the same policy type that the pipeline
/// predicts with, so both read one threshold value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ThresholdPolicy {
    threshold: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl TryFrom<f64> for ThresholdPolicy {
    type Error = PlacementError;

    fn try_from(threshold: f64) -> Result<Self> {
        Self::new(threshold)
    }
}

impl From<ThresholdPolicy> for f64 {
    fn from(policy: ThresholdPolicy) -> Self {
        policy.threshold
    }
}

impl ThresholdPolicy {
    pub fn new(threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PlacementError::ConfigError(format!(
                "threshold must lie in [0, 1], got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn decide(&self, probability: f64) -> bool {
        probability >= self.threshold
    }

    pub fn decide_all<'a>(&self, probabilities: impl IntoIterator<Item = &'a f64>) -> Vec<bool> {
        probabilities.into_iter().map(|&p| self.decide(p)).collect()
    }
}
