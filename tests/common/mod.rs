//! Shared fixtures for integration tests
#![allow(dead_code)]

use ndarray::{Array1, Array2};
use placement::features::{FeatureSchema, PLACEMENT_FEATURES};
use placement::inference::{
    InferenceConfig, PlacementPipeline, PredictionRequest, ThresholdPolicy,
};
use placement::training::{Trainer, TrainingConfig, TrainingOutcome};
use placement::utils::Dataset;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

/// Raw values for the end-to-end scenario case
pub const SCENARIO: [(&str, f64); 8] = [
    ("work_experience_months", 9.0),
    ("backlogs", 16.0),
    ("soft_skill_score", 73.0),
    ("technical_skill_score", 94.0),
    ("certifications", 4.0),
    ("entrance_exam_score", 73.0),
    ("internship_count", 3.0),
    ("live_projects", 3.0),
];

/// Seeded synthetic placement data.
///
/// The `round(n * positive_rate)` rows with the highest noisy score are
/// labelled placed, so the class ratio is exact.
pub fn synthetic_placement(n: usize, positive_rate: f64, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x = Array2::zeros((n, PLACEMENT_FEATURES.len()));
    let mut scores = Vec::with_capacity(n);

    for i in 0..n {
        let row = [
            rng.gen_range(0..=36) as f64,
            rng.gen_range(0..=20) as f64,
            rng.gen_range(40..=100) as f64,
            rng.gen_range(40..=100) as f64,
            rng.gen_range(0..=10) as f64,
            rng.gen_range(40..=100) as f64,
            rng.gen_range(0..=5) as f64,
            rng.gen_range(0..=6) as f64,
        ];
        let score = 0.05 * row[0] - 0.15 * row[1] + 0.03 * row[2] + 0.04 * row[3]
            + 0.1 * row[4]
            + 0.03 * row[5]
            + 0.3 * row[6]
            + 0.2 * row[7]
            + rng.gen_range(-1.0..1.0);
        for (j, v) in row.iter().enumerate() {
            x[[i, j]] = *v;
        }
        scores.push((i, score));
    }

    scores.sort_by(|a, b| b.1.total_cmp(&a.1));
    let n_pos = (n as f64 * positive_rate).round() as usize;
    let mut y = Array1::zeros(n);
    for &(i, _) in scores.iter().take(n_pos) {
        y[i] = 1.0;
    }

    Dataset::new(Arc::new(FeatureSchema::placement()), x, y).expect("valid synthetic dataset")
}

/// Training config sized for tests
pub fn test_config(n_estimators: usize) -> TrainingConfig {
    TrainingConfig::new().with_n_estimators(n_estimators)
}

pub fn fit(dataset: &Dataset, n_estimators: usize) -> TrainingOutcome {
    Trainer::new(test_config(n_estimators))
        .fit(dataset, &ThresholdPolicy::default())
        .expect("fit succeeds")
}

/// Pipeline fitted on 300 synthetic rows with seed 42
pub fn fitted_pipeline(config: &InferenceConfig) -> PlacementPipeline {
    let dataset = synthetic_placement(300, 0.4, 42);
    let outcome = fit(&dataset, 50);
    PlacementPipeline::new(FeatureSchema::placement(), outcome.scaler, outcome.forest, config)
        .expect("pipeline assembles")
}

pub fn scenario_request() -> PredictionRequest {
    PredictionRequest::from_values(SCENARIO)
}

/// Write a dataset as CSV with a header and the given label column
pub fn write_csv(dataset: &Dataset, target: &str, path: &Path) {
    let mut out = String::new();
    let header: Vec<&str> = dataset.schema().names().chain(std::iter::once(target)).collect();
    writeln!(out, "{}", header.join(",")).unwrap();
    for (row, label) in dataset.x().rows().into_iter().zip(dataset.y().iter()) {
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{},{}", values.join(","), label).unwrap();
    }
    std::fs::write(path, out).expect("write csv");
}
