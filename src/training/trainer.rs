//! End-to-end fitting phase

use super::config::TrainingConfig;
use super::metrics::ClassificationReport;
use super::random_forest::RandomForest;
use super::split::{shuffle_split, stratified_split};
use crate::error::Result;
use crate::inference::ThresholdPolicy;
use crate::preprocessing::StandardScaler;
use crate::utils::Dataset;
use std::time::Instant;
use tracing::info;

/// Fitted artifacts plus the held-out evaluation
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub scaler: StandardScaler,
    pub forest: RandomForest,
    pub report: ClassificationReport,
    pub n_train: usize,
    pub n_test: usize,
    pub training_time_secs: f64,
}

/// Runs split, scaling, forest fitting and evaluation
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit both artifacts on the training partition and report on the test partition.
    ///
    /// The scaler only ever sees training rows; the test rows are transformed with
    /// the parameters learned there.
    pub fn fit(&self, dataset: &Dataset, policy: &ThresholdPolicy) -> Result<TrainingOutcome> {
        self.config.validate()?;
        let start = Instant::now();

        let split = if self.config.stratify {
            stratified_split(dataset.y(), self.config.test_size, self.config.split_seed)?
        } else {
            shuffle_split(dataset.n_samples(), self.config.test_size, self.config.split_seed)?
        };
        let (x_train, x_test, y_train, y_test) = split.apply(dataset.x(), dataset.y());

        info!(
            n_train = x_train.nrows(),
            n_test = x_test.nrows(),
            stratify = self.config.stratify,
            seed = self.config.split_seed,
            "Split dataset"
        );

        let mut scaler = StandardScaler::new(dataset.schema().as_ref().clone());
        let x_train_scaled = scaler.fit_transform(&x_train)?;
        let x_test_scaled = scaler.transform(&x_test)?;

        let mut forest = RandomForest::new(self.config.forest.clone());
        forest.fit(&x_train_scaled, &y_train)?;

        let probabilities = forest.predict_positive_batch(&x_test_scaled)?;
        let y_pred = policy.decide_all(probabilities.iter());
        let y_true: Vec<bool> = y_test.iter().map(|&v| v == 1.0).collect();
        let report = ClassificationReport::compute(&y_true, &y_pred, policy.threshold())?;

        let training_time_secs = start.elapsed().as_secs_f64();
        info!(
            accuracy = report.accuracy,
            positive_recall = report.positive().recall,
            threshold = policy.threshold(),
            training_time_secs,
            "Fitting finished"
        );

        Ok(TrainingOutcome {
            scaler,
            forest,
            report,
            n_train: x_train.nrows(),
            n_test: x_test.nrows(),
            training_time_secs,
        })
    }
}
