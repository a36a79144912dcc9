//! Immutable prediction-and-explanation pipeline

use super::config::{AttributionMethod, InferenceConfig};
use super::request::PredictionRequest;
use super::threshold::ThresholdPolicy;
use crate::error::{PlacementError, Result};
use crate::explainability::{
    Attribution, Attributor, ContributionSummary, SamplingAttributor, TreeShapAttributor,
};
use crate::export;
use crate::features::{FeatureSchema, FeatureVector};
use crate::preprocessing::StandardScaler;
use crate::training::{ClassificationReport, RandomForest, POSITIVE_CLASS};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Placed iff `probability >= threshold`
    pub decision: bool,
    /// Placed-class probability
    pub probability: f64,
    pub threshold: f64,
    /// Attribution base value for the placed class
    pub base_value: f64,
    /// Signed contribution per field
    pub attribution: BTreeMap<String, f64>,
    /// Absolute contribution per field
    pub summary: BTreeMap<String, f64>,
}

impl PredictionResponse {
    /// Summary weights as shares of their total, largest first
    pub fn ranked_shares(&self) -> Vec<(String, f64)> {
        let total: f64 = self.summary.values().sum();
        let mut shares: Vec<(String, f64)> = self
            .summary
            .iter()
            .map(|(name, w)| (name.clone(), if total > 0.0 { w / total } else { 0.0 }))
            .collect();
        shares.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        shares
    }
}

/// Fitted scaler and forest plus the threshold and attribution backend.
///
/// Built once, then shared read-only; every call takes `&self`.
pub struct PlacementPipeline {
    schema: Arc<FeatureSchema>,
    scaler: StandardScaler,
    forest: RandomForest,
    policy: ThresholdPolicy,
    attributor: Box<dyn Attributor>,
}

impl fmt::Debug for PlacementPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacementPipeline")
            .field("schema", &self.schema)
            .field("n_trees", &self.forest.n_trees())
            .field("policy", &self.policy)
            .field("attributor", &self.attributor.name())
            .finish()
    }
}

impl PlacementPipeline {
    /// Check both artifacts against the schema and assemble the pipeline
    pub fn new(
        schema: FeatureSchema,
        scaler: StandardScaler,
        forest: RandomForest,
        config: &InferenceConfig,
    ) -> Result<Self> {
        config.validate()?;
        let attributor: Box<dyn Attributor> = match config.attribution {
            AttributionMethod::TreeShap => Box::new(TreeShapAttributor::new()),
            AttributionMethod::Sampling {
                n_permutations,
                seed,
            } => Box::new(SamplingAttributor::new(n_permutations, seed)),
        };
        let policy = ThresholdPolicy::new(config.threshold)?;
        Self::with_attributor(schema, scaler, forest, policy, attributor)
    }

    /// Assemble with a caller-supplied attribution backend
    pub fn with_attributor(
        schema: FeatureSchema,
        scaler: StandardScaler,
        forest: RandomForest,
        policy: ThresholdPolicy,
        attributor: Box<dyn Attributor>,
    ) -> Result<Self> {
        schema.ensure_matches(scaler.schema(), "pipeline")?;
        scaler.validate()?;
        forest.validate()?;
        schema.ensure_width(forest.n_features(), "forest")?;
        forest.class_index(POSITIVE_CLASS)?;

        info!(
            schema = %schema,
            n_trees = forest.n_trees(),
            threshold = policy.threshold(),
            attributor = attributor.name(),
            "Pipeline ready"
        );

        Ok(Self {
            schema: Arc::new(schema),
            scaler,
            forest,
            policy,
            attributor,
        })
    }

    /// Load `scaler.json` and `model.json` from `dir`, checked against `schema`
    pub fn load(
        dir: impl AsRef<Path>,
        schema: FeatureSchema,
        config: &InferenceConfig,
    ) -> Result<Self> {
        let (scaler, forest) = export::load_artifacts(dir, &schema)?;
        Self::new(schema, scaler, forest, config)
    }

    /// Validate a request, then predict and explain it
    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        let raw = request.validate(&self.schema)?;
        self.predict_vector(&raw)
    }

    /// Predict and explain an already-validated raw vector
    pub fn predict_vector(&self, raw: &FeatureVector) -> Result<PredictionResponse> {
        let standardized = self.scaler.standardize(raw)?;
        let probability = self.forest.predict_positive(standardized.values())?;
        let decision = self.policy.decide(probability);
        let attribution = self.attributor.explain(&self.forest, &standardized)?;
        let summary = ContributionSummary::from_attribution(&attribution);

        debug!(probability, decision, attributor = self.attributor.name(), "Prediction");

        Ok(PredictionResponse {
            decision,
            probability,
            threshold: self.policy.threshold(),
            base_value: attribution.base_value,
            attribution: attribution.to_map(),
            summary: summary.to_map(),
        })
    }

    /// Full attribution (with standardized values) for a raw vector
    pub fn explain(&self, raw: &FeatureVector) -> Result<Attribution> {
        let standardized = self.scaler.standardize(raw)?;
        self.attributor.explain(&self.forest, &standardized)
    }

    /// Report on labelled raw rows using this pipeline's threshold
    pub fn evaluate(&self, x_raw: &Array2<f64>, y: &Array1<f64>) -> Result<ClassificationReport> {
        if x_raw.nrows() != y.len() {
            return Err(PlacementError::shape(
                format!("{} labels", x_raw.nrows()),
                format!("{} labels", y.len()),
            ));
        }
        let x = self.scaler.transform(x_raw)?;
        let probabilities = self.forest.predict_positive_batch(&x)?;
        let y_pred = self.policy.decide_all(probabilities.iter());
        let y_true: Vec<bool> = y.iter().map(|&v| v == POSITIVE_CLASS).collect();
        ClassificationReport::compute(&y_true, &y_pred, self.policy.threshold())
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn attributor_name(&self) -> &'static str {
        self.attributor.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FieldSpec;
    use ndarray::array;

    fn assert_send_sync<T: Send + Sync>() {}

    fn schema() -> FeatureSchema {
        FeatureSchema::new(1, vec![FieldSpec::new("a"), FieldSpec::new("b")]).unwrap()
    }

    fn fitted() -> (StandardScaler, RandomForest) {
        let x = array![
            [1.0, 5.0],
            [2.0, 3.0],
            [3.0, 4.0],
            [7.0, 5.0],
            [8.0, 3.0],
            [9.0, 4.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut scaler = StandardScaler::new(schema());
        let xs = scaler.fit_transform(&x).unwrap();
        let mut forest = RandomForest::new_classifier(15).with_random_state(5);
        forest.fit(&xs, &y).unwrap();
        (scaler, forest)
    }

    #[test]
    fn test_pipeline_is_send_sync() {
        assert_send_sync::<PlacementPipeline>();
    }

    #[test]
    fn test_predict_is_consistent() {
        let (scaler, forest) = fitted();
        let pipeline =
            PlacementPipeline::new(schema(), scaler, forest, &InferenceConfig::default()).unwrap();
        let request = PredictionRequest::from_values([("b", 4.0), ("a", 8.5)]);
        let response = pipeline.predict(&request).unwrap();

        assert_eq!(response.decision, response.probability >= 0.59);
        assert_eq!(response.threshold, 0.59);
        let total: f64 = response.attribution.values().sum();
        assert!((response.base_value + total - response.probability).abs() < 1e-9);
        for (name, value) in &response.attribution {
            assert_eq!(response.summary[name], value.abs());
        }
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let (scaler, forest) = fitted();
        let other = FeatureSchema::new(2, vec![FieldSpec::new("a"), FieldSpec::new("b")]).unwrap();
        let err =
            PlacementPipeline::new(other, scaler, forest, &InferenceConfig::default()).unwrap_err();
        assert!(matches!(err, PlacementError::ShapeError { .. }));
    }

    #[test]
    fn test_unfitted_forest_rejected() {
        let (scaler, _) = fitted();
        let err = PlacementPipeline::new(
            schema(),
            scaler,
            RandomForest::default(),
            &InferenceConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PlacementError::ModelUnavailableError(_)));
    }

    #[test]
    fn test_evaluate_uses_pipeline_threshold() {
        let (scaler, forest) = fitted();
        let x = array![[1.0, 5.0], [9.0, 4.0]];
        let y = array![0.0, 1.0];

        let strict = PlacementPipeline::new(
            schema(),
            scaler.clone(),
            forest.clone(),
            &InferenceConfig::default().with_threshold(1.0),
        )
        .unwrap();
        let report = strict.evaluate(&x, &y).unwrap();
        assert_eq!(report.threshold, 1.0);

        let lenient = PlacementPipeline::new(
            schema(),
            scaler,
            forest,
            &InferenceConfig::default().with_threshold(0.0),
        )
        .unwrap();
        let report = lenient.evaluate(&x, &y).unwrap();
        assert_eq!(report.positive().recall, 1.0);
        assert_eq!(report.negative().recall, 0.0);
    }

    #[test]
    fn test_ranked_shares() {
        let response = PredictionResponse {
            decision: true,
            probability: 0.7,
            threshold: 0.59,
            base_value: 0.5,
            attribution: BTreeMap::from([("a".to_string(), -0.05), ("b".to_string(), 0.25)]),
            summary: BTreeMap::from([("a".to_string(), 0.05), ("b".to_string(), 0.25)]),
        };
        let shares = response.ranked_shares();
        assert_eq!(shares[0].0, "b");
        assert!((shares[0].1 - 0.25 / 0.3).abs() < 1e-12);
    }
}
