//! Attribution types shared by every explanation backend

use crate::error::{PlacementError, Result};
use crate::features::FeatureVector;
use crate::training::RandomForest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Computes per-feature contributions to the placed-class probability.
///
/// Implementations only read the model, so one instance can serve concurrent calls.
pub trait Attributor: Send + Sync {
    /// Short backend name, used in logs
    fn name(&self) -> &'static str;

    /// Explain the positive-class output for one standardized vector
    fn explain(&self, model: &RandomForest, x: &FeatureVector) -> Result<Attribution>;
}

/// One feature's contribution to a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    /// Field name from the schema
    pub name: String,
    /// Standardized value the model saw
    pub value: f64,
    /// Signed contribution
    pub contribution: f64,
}

/// Signed per-feature contributions for one class.
///
/// `base_value + sum(contributions) == output` up to rounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Contributions in schema order
    pub contributions: Vec<FeatureContribution>,
    /// Model output with no feature information
    pub base_value: f64,
    /// Model output for this vector
    pub output: f64,
}

impl Attribution {
    /// Name-keyed mapping
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.contributions
            .iter()
            .map(|c| (c.name.clone(), c.contribution))
            .collect()
    }

    /// Contribution of a field by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.contribution)
    }

    pub fn sum_contributions(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }

    /// `|base_value + sum - output|`
    pub fn additivity_gap(&self) -> f64 {
        (self.base_value + self.sum_contributions() - self.output).abs()
    }

    /// Contributions sorted by absolute value, descending
    pub fn sorted_contributions(&self) -> Vec<&FeatureContribution> {
        let mut sorted: Vec<&FeatureContribution> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        sorted
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }
}

/// Per-class attribution channels, as produced for a multi-output model
#[derive(Debug, Clone, PartialEq)]
pub struct ClassAttributions {
    /// Class labels in channel order
    pub classes: Vec<f64>,
    /// Base value per class
    pub base_values: Vec<f64>,
    /// Model output per class
    pub outputs: Vec<f64>,
    /// `values[class][feature]`
    pub values: Vec<Vec<f64>>,
    /// Vector the channels were computed for
    pub vector: FeatureVector,
}

impl ClassAttributions {
    /// Pick the channel for `label`.
    ///
    /// Fails when the label is not a model class or when the channel layout does
    /// not line up with the classes, since either would attribute the wrong output.
    pub fn select_class(&self, label: f64) -> Result<Attribution> {
        let n_classes = self.classes.len();
        if self.values.len() != n_classes
            || self.base_values.len() != n_classes
            || self.outputs.len() != n_classes
        {
            return Err(PlacementError::ClassSelectionError(format!(
                "{} classes but {} attribution channels, {} base values, {} outputs",
                n_classes,
                self.values.len(),
                self.base_values.len(),
                self.outputs.len()
            )));
        }

        let channel = self.classes.iter().position(|&c| c == label).ok_or_else(|| {
            PlacementError::ClassSelectionError(format!(
                "class {} not among attribution channels {:?}",
                label, self.classes
            ))
        })?;

        let values = &self.values[channel];
        if values.len() != self.vector.len() {
            return Err(PlacementError::ClassSelectionError(format!(
                "channel {} has {} entries for {} features",
                channel,
                values.len(),
                self.vector.len()
            )));
        }

        let contributions = self
            .vector
            .iter()
            .zip(values)
            .map(|((name, value), &contribution)| FeatureContribution {
                name: name.to_string(),
                value,
                contribution,
            })
            .collect();

        Ok(Attribution {
            contributions,
            base_value: self.base_values[channel],
            output: self.outputs[channel],
        })
    }
}

/// Absolute contribution per feature, for relative-importance display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionSummary {
    /// `(name, |contribution|)` in schema order
    weights: Vec<(String, f64)>,
}

impl ContributionSummary {
    pub fn from_attribution(attribution: &Attribution) -> Self {
        Self {
            weights: attribution
                .contributions
                .iter()
                .map(|c| (c.name.clone(), c.contribution.abs()))
                .collect(),
        }
    }

    pub fn weights(&self) -> &[(String, f64)] {
        &self.weights
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.weights.iter().find(|(n, _)| n == name).map(|(_, w)| *w)
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().map(|(_, w)| w).sum()
    }

    /// Name-keyed mapping of the raw weights
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.weights.iter().cloned().collect()
    }

    /// Weights divided by their total (all zeros when the total is zero)
    pub fn shares(&self) -> Vec<(String, f64)> {
        let total = self.total();
        self.weights
            .iter()
            .map(|(name, w)| {
                let share = if total > 0.0 { w / total } else { 0.0 };
                (name.clone(), share)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureSchema, FieldSpec};
    use std::sync::Arc;

    fn vector() -> FeatureVector {
        let schema =
            FeatureSchema::new(1, vec![FieldSpec::new("a"), FieldSpec::new("b")]).unwrap();
        FeatureVector::from_named(Arc::new(schema), [("a", 0.5), ("b", -1.0)]).unwrap()
    }

    fn channels() -> ClassAttributions {
        ClassAttributions {
            classes: vec![0.0, 1.0],
            base_values: vec![0.6, 0.4],
            outputs: vec![0.3, 0.7],
            values: vec![vec![-0.2, -0.1], vec![0.2, 0.1]],
            vector: vector(),
        }
    }

    #[test]
    fn test_select_positive_channel() {
        let attr = channels().select_class(1.0).unwrap();
        assert_eq!(attr.get("a"), Some(0.2));
        assert_eq!(attr.get("b"), Some(0.1));
        assert_eq!(attr.base_value, 0.4);
        assert!(attr.additivity_gap() < 1e-12);
        assert_eq!(attr.contributions[1].value, -1.0);
    }

    #[test]
    fn test_missing_label() {
        let err = channels().select_class(2.0).unwrap_err();
        assert!(matches!(err, PlacementError::ClassSelectionError(_)));
    }

    #[test]
    fn test_channel_count_mismatch() {
        let mut c = channels();
        c.values.pop();
        assert!(matches!(
            c.select_class(1.0),
            Err(PlacementError::ClassSelectionError(_))
        ));
    }

    #[test]
    fn test_summary_is_absolute() {
        let attr = channels().select_class(0.0).unwrap();
        let summary = ContributionSummary::from_attribution(&attr);
        assert_eq!(summary.get("a"), Some(0.2));
        assert_eq!(summary.get("b"), Some(0.1));

        let shares = summary.shares();
        assert!((shares[0].1 - 2.0 / 3.0).abs() < 1e-12);
        assert!((shares.iter().map(|(_, s)| s).sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_summary_shares() {
        let attr = Attribution {
            contributions: vec![FeatureContribution {
                name: "a".into(),
                value: 0.0,
                contribution: 0.0,
            }],
            base_value: 0.5,
            output: 0.5,
        };
        let summary = ContributionSummary::from_attribution(&attr);
        assert_eq!(summary.shares(), vec![("a".to_string(), 0.0)]);
    }

    #[test]
    fn test_sorted_contributions() {
        let attr = channels().select_class(1.0).unwrap();
        let sorted = attr.sorted_contributions();
        assert_eq!(sorted[0].name, "a");
    }
}
