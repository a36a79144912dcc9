//! Classification metrics

use crate::error::{PlacementError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metrics for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Binary confusion counts, positive class = 1
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionCounts {
    pub fn from_labels(y_true: &[bool], y_pred: &[bool]) -> Self {
        let mut counts = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (false, false) => counts.tn += 1,
                (true, false) => counts.fn_ += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

/// Per-class precision/recall/F1 plus accuracy and averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Index 0 = not placed, 1 = placed
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: [f64; 3],
    pub weighted_avg: [f64; 3],
    pub confusion: ConfusionCounts,
    /// Threshold the predictions were produced with
    pub threshold: f64,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

impl ClassificationReport {
    /// Build a report from true labels and thresholded decisions
    pub fn compute(y_true: &[bool], y_pred: &[bool], threshold: f64) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PlacementError::shape(
                format!("{} predictions", y_true.len()),
                format!("{} predictions", y_pred.len()),
            ));
        }
        if y_true.is_empty() {
            return Err(PlacementError::DataError(
                "cannot report on an empty evaluation set".to_string(),
            ));
        }

        let c = ConfusionCounts::from_labels(y_true, y_pred);

        let positive = {
            let precision = ratio(c.tp, c.tp + c.fp);
            let recall = ratio(c.tp, c.tp + c.fn_);
            ClassMetrics {
                label: 1,
                precision,
                recall,
                f1_score: f1(precision, recall),
                support: c.tp + c.fn_,
            }
        };
        let negative = {
            let precision = ratio(c.tn, c.tn + c.fn_);
            let recall = ratio(c.tn, c.tn + c.fp);
            ClassMetrics {
                label: 0,
                precision,
                recall,
                f1_score: f1(precision, recall),
                support: c.tn + c.fp,
            }
        };

        let total = c.total() as f64;
        let avg = |get: fn(&ClassMetrics) -> f64| (get(&negative) + get(&positive)) / 2.0;
        let weighted = |get: fn(&ClassMetrics) -> f64| {
            (get(&negative) * negative.support as f64 + get(&positive) * positive.support as f64)
                / total
        };

        let macro_avg = [avg(|m| m.precision), avg(|m| m.recall), avg(|m| m.f1_score)];
        let weighted_avg = [
            weighted(|m| m.precision),
            weighted(|m| m.recall),
            weighted(|m| m.f1_score),
        ];

        Ok(Self {
            accuracy: ratio(c.tp + c.tn, c.total()),
            classes: [negative, positive],
            macro_avg,
            weighted_avg,
            confusion: c,
            threshold,
        })
    }

    /// Metrics for the placed class
    pub fn positive(&self) -> &ClassMetrics {
        &self.classes[1]
    }

    /// Metrics for the not-placed class
    pub fn negative(&self) -> &ClassMetrics {
        &self.classes[0]
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.classes {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.label, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        writeln!(f)?;
        let total = self.confusion.total();
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, total
        )?;
        writeln!(
            f,
            "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
            "macro avg", self.macro_avg[0], self.macro_avg[1], self.macro_avg[2], total
        )?;
        write!(
            f,
            "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
            "weighted avg",
            self.weighted_avg[0],
            self.weighted_avg[1],
            self.weighted_avg[2],
            total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_metrics() {
        let y_true = [true, false, true, true, false, true, false, false];
        let y_pred = [true, false, true, false, false, true, true, false];

        let report = ClassificationReport::compute(&y_true, &y_pred, 0.59).unwrap();

        assert_eq!(report.confusion.tp, 3);
        assert_eq!(report.confusion.fp, 1);
        assert_eq!(report.confusion.fn_, 1);
        assert_eq!(report.confusion.tn, 3);
        assert!((report.accuracy - 0.75).abs() < 1e-12);
        assert!((report.positive().precision - 0.75).abs() < 1e-12);
        assert!((report.positive().recall - 0.75).abs() < 1e-12);
        assert_eq!(report.positive().support, 4);
        assert_eq!(report.negative().support, 4);
    }

    #[test]
    fn test_no_positive_predictions() {
        let y_true = [true, false, false];
        let y_pred = [false, false, false];
        let report = ClassificationReport::compute(&y_true, &y_pred, 0.5).unwrap();
        assert_eq!(report.positive().recall, 0.0);
        assert_eq!(report.positive().precision, 0.0);
        assert_eq!(report.positive().f1_score, 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(ClassificationReport::compute(&[true], &[true, false], 0.5).is_err());
    }

    #[test]
    fn test_display_has_rows() {
        let report =
            ClassificationReport::compute(&[true, false], &[true, false], 0.59).unwrap();
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("macro avg"));
        assert!(text.contains("weighted avg"));
    }
}
