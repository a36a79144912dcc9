//! Random Forest implementation

use super::decision_tree::{Criterion, DecisionTree};
use crate::error::{PlacementError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Label of the positive (placed) class
pub const POSITIVE_CLASS: f64 = 1.0;

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features (rounded down)
    Sqrt,
    /// Log2 of n_features (rounded down)
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }
}

/// How classes are weighted during fitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassWeight {
    /// Every row counts once
    Uniform,
    /// `n_samples / (n_classes * count_c)`, from the full training labels
    Balanced,
}

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Class reweighting scheme
    pub class_weight: ClassWeight,
    /// Random state
    pub random_state: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            class_weight: ClassWeight::Balanced,
            random_state: Some(42),
        }
    }
}

/// Random Forest classifier.
///
/// Immutable after `fit`: every prediction and attribution call takes `&self`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Hyperparameters used for fitting
    params: ForestParams,
    /// Number of features
    n_features: usize,
    /// Sorted class labels
    classes: Vec<f64>,
    /// Weight applied to each class during fitting
    class_weights: Vec<f64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl RandomForest {
    /// Create an unfitted forest
    pub fn new(params: ForestParams) -> Self {
        Self {
            trees: Vec::new(),
            params,
            n_features: 0,
            classes: Vec::new(),
            class_weights: Vec::new(),
            feature_importances: None,
        }
    }

    /// Create a new classifier forest with default hyperparameters
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self::new(ForestParams {
            n_estimators,
            ..ForestParams::default()
        })
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.params.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.params.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.params.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.params.max_features = max_features;
        self
    }

    /// Set class weighting
    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.params.class_weight = class_weight;
        self
    }

    /// Enable or disable bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.params.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.params.random_state = Some(seed);
        self
    }

    /// Fit the forest. `y` holds 0/1 labels and must contain both classes.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PlacementError::shape(
                format!("y length = {}", n_samples),
                format!("y length = {}", y.len()),
            ));
        }
        if n_samples == 0 || n_features == 0 {
            return Err(PlacementError::TrainingError(format!(
                "cannot fit on a {}x{} matrix",
                n_samples, n_features
            )));
        }
        if self.params.n_estimators == 0 {
            return Err(PlacementError::ConfigError(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if let Some(bad) = x.iter().find(|v| !v.is_finite()) {
            return Err(PlacementError::TrainingError(format!(
                "training matrix contains non-finite value {}",
                bad
            )));
        }
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(PlacementError::TrainingError(format!(
                "labels must be 0 or 1, found {}",
                bad
            )));
        }

        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        if classes.len() < 2 {
            return Err(PlacementError::TrainingError(
                "training labels contain a single class".to_string(),
            ));
        }
        let n_classes = classes.len();

        let labels: Vec<usize> = y
            .iter()
            .map(|v| classes.iter().position(|c| c == v).unwrap_or(0))
            .collect();
        let class_weights = self.compute_class_weights(&labels, n_classes);
        let max_features = self.params.max_features.resolve(n_features);
        let base_seed = self.params.random_state.unwrap_or(42);

        info!(
            n_estimators = self.params.n_estimators,
            n_samples,
            n_features,
            max_features,
            class_weights = ?class_weights,
            "Fitting random forest"
        );

        let params = &self.params;
        let trees: Vec<DecisionTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                // Bootstrap multiplicities
                let mut counts = vec![0u32; n_samples];
                if params.bootstrap {
                    for _ in 0..n_samples {
                        counts[rng.gen_range(0..n_samples)] += 1;
                    }
                } else {
                    counts.iter_mut().for_each(|c| *c = 1);
                }

                let sample_weight: Vec<f64> = counts
                    .iter()
                    .zip(&labels)
                    .map(|(&c, &label)| c as f64 * class_weights[label])
                    .collect();

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(params.min_samples_split)
                    .with_min_samples_leaf(params.min_samples_leaf)
                    .with_criterion(params.criterion);
                if let Some(d) = params.max_depth {
                    tree = tree.with_max_depth(d);
                }
                tree.max_features = Some(max_features);

                tree.fit_weighted(x, &labels, n_classes, &sample_weight, &mut rng)?;
                debug!(tree_idx, depth = tree.get_depth(), leaves = tree.get_n_leaves(), "Tree fitted");
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.n_features = n_features;
        self.classes = classes;
        self.class_weights = class_weights;
        self.compute_feature_importances();

        info!(n_trees = self.trees.len(), "Random forest fitted");
        Ok(self)
    }

    fn compute_class_weights(&self, labels: &[usize], n_classes: usize) -> Vec<f64> {
        match self.params.class_weight {
            ClassWeight::Uniform => vec![1.0; n_classes],
            ClassWeight::Balanced => {
                let mut counts = vec![0usize; n_classes];
                for &label in labels {
                    counts[label] += 1;
                }
                let n = labels.len() as f64;
                counts
                    .iter()
                    .map(|&c| if c == 0 { 0.0 } else { n / (n_classes as f64 * c as f64) })
                    .collect()
            }
        }
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    if i < self.n_features {
                        total_importances[i] += val;
                    }
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        for imp in &mut total_importances {
            *imp /= n_trees;
        }

        // Normalize
        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Mean of the per-tree leaf class distributions for one row
    pub fn predict_proba_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        self.ensure_fitted()?;
        if row.len() != self.n_features {
            return Err(PlacementError::shape(
                format!("{} features", self.n_features),
                format!("{} features", row.len()),
            ));
        }

        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let dist = tree.predict_proba_row(row)?;
            for (p, d) in proba.iter_mut().zip(dist) {
                *p += d;
            }
        }
        let n_trees = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n_trees);
        Ok(proba)
    }

    /// Predict class probabilities, one column per entry of `classes()`
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.ensure_fitted()?;

        let rows: Vec<Vec<f64>> = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| self.predict_proba_row(&row.to_vec()))
            .collect::<Result<Vec<_>>>()?;

        let n_classes = self.classes.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((x.nrows(), n_classes), flat)?)
    }

    /// Probability of the positive class for one row
    pub fn predict_positive(&self, row: &[f64]) -> Result<f64> {
        let idx = self.class_index(POSITIVE_CLASS)?;
        Ok(self.predict_proba_row(row)?[idx])
    }

    /// Positive-class probability for every row
    pub fn predict_positive_batch(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let idx = self.class_index(POSITIVE_CLASS)?;
        Ok(self.predict_proba(x)?.column(idx).to_owned())
    }

    /// Column index of a class label in probability outputs
    pub fn class_index(&self, label: f64) -> Result<usize> {
        self.classes.iter().position(|&c| c == label).ok_or_else(|| {
            PlacementError::ClassSelectionError(format!(
                "class {} not among model classes {:?}",
                label, self.classes
            ))
        })
    }

    /// Structural check for forests loaded from an artifact
    pub fn validate(&self) -> Result<()> {
        self.ensure_fitted()?;
        if self.classes.is_empty() {
            return Err(PlacementError::ModelUnavailableError(
                "forest has no classes".to_string(),
            ));
        }
        for tree in &self.trees {
            tree.validate(self.n_features, self.classes.len())?;
        }
        Ok(())
    }

    fn ensure_fitted(&self) -> Result<()> {
        if self.trees.is_empty() {
            Err(PlacementError::ModelUnavailableError(
                "random forest is not fitted".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn class_weights(&self) -> &[f64] {
        &self.class_weights
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
