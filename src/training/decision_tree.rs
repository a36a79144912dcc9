//! Decision tree implementation
//!
//! CART classification tree with weighted impurity and class-probability
//! leaves. Every node records its cover (the weighted sample mass that reached
//! it), which the attribution code relies on.

use crate::error::{PlacementError, Result};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Gains at or below this are treated as no improvement
const MIN_GAIN: f64 = 1e-12;

/// Largest number of classes `fit` accepts
const MAX_CLASSES: usize = 256;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with a class distribution (sums to 1)
    Leaf {
        distribution: Vec<f64>,
        cover: f64,
        n_samples: usize,
    },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        cover: f64,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    /// Weighted sample mass that reached this node during fitting
    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Leaf { cover, .. } | TreeNode::Split { cover, .. } => *cover,
        }
    }

    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Leaf { n_samples, .. } | TreeNode::Split { n_samples, .. } => *n_samples,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    /// Leaf reached by `sample`
    pub fn leaf_for(&self, sample: &[f64]) -> &[f64] {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { distribution, .. } => return distribution,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Cover-weighted mean of the leaf distributions below this node
    pub fn expected_value(&self) -> Vec<f64> {
        match self {
            TreeNode::Leaf { distribution, .. } => distribution.clone(),
            TreeNode::Split { left, right, cover, .. } => {
                let l = left.expected_value();
                let r = right.expected_value();
                if *cover <= 0.0 {
                    return l.iter().zip(&r).map(|(a, b)| (a + b) / 2.0).collect();
                }
                l.iter()
                    .zip(&r)
                    .map(|(a, b)| (a * left.cover() + b * right.cover()) / cover)
                    .collect()
            }
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Shannon entropy
    Entropy,
}

impl Criterion {
    /// Impurity of a node from its weighted class totals
    pub fn impurity(&self, class_weights: &[f64], total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Gini => {
                1.0 - class_weights
                    .iter()
                    .map(|w| (w / total).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -class_weights
                .iter()
                .filter(|w| **w > 0.0)
                .map(|w| {
                    let p = w / total;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

/// Best split found for a node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Weighted impurity decrease: `W * imp - W_l * imp_l - W_r * imp_r`
    gain: f64,
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Number of features
    n_features: usize,
    /// Number of classes
    n_classes: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Fit with unit weights. Labels must be class indices `0..n_classes`.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(PlacementError::shape(
                format!("y length = {}", x.nrows()),
                format!("y length = {}", y.len()),
            ));
        }
        let labels = y
            .iter()
            .map(|&v| {
                if v >= 0.0 && v.fract() == 0.0 && v < MAX_CLASSES as f64 {
                    Ok(v as usize)
                } else {
                    Err(PlacementError::TrainingError(format!(
                        "label {} is not a class index below {}",
                        v, MAX_CLASSES
                    )))
                }
            })
            .collect::<Result<Vec<usize>>>()?;
        let n_classes = labels.iter().max().map_or(0, |m| m + 1);
        let weights = vec![1.0; labels.len()];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        self.fit_weighted(x, &labels, n_classes, &weights, &mut rng)?;
        Ok(self)
    }

    /// Fit on rows with positive weight. Weights scale every class count, so they
    /// carry both class reweighting and bootstrap multiplicity.
    pub(crate) fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        sample_weight: &[f64],
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() || n_samples != sample_weight.len() {
            return Err(PlacementError::shape(
                format!("{} labels and weights", n_samples),
                format!("{} labels, {} weights", y.len(), sample_weight.len()),
            ));
        }
        if n_classes == 0 || y.iter().any(|&c| c >= n_classes) {
            return Err(PlacementError::TrainingError(format!(
                "labels must lie in 0..{}",
                n_classes
            )));
        }

        let indices: Vec<usize> = (0..n_samples).filter(|&i| sample_weight[i] > 0.0).collect();
        if indices.is_empty() {
            return Err(PlacementError::TrainingError(
                "no rows with positive weight".to_string(),
            ));
        }

        let max_features = self.max_features.unwrap_or(n_features).clamp(1, n_features.max(1));
        let mut builder = TreeBuilder {
            tree: &*self,
            x,
            y,
            w: sample_weight,
            n_classes,
            max_features,
            rng,
            importances: vec![0.0; n_features],
        };
        let root = builder.build(indices, 0);
        let mut importances = builder.importances;

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.root = Some(root);
        self.n_features = n_features;
        self.n_classes = n_classes;
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    /// Class distribution of the leaf reached by one row
    pub fn predict_proba_row(&self, row: &[f64]) -> Result<&[f64]> {
        let root = self.root.as_ref().ok_or_else(|| {
            PlacementError::ModelUnavailableError("decision tree is not fitted".to_string())
        })?;
        if row.len() != self.n_features {
            return Err(PlacementError::shape(
                format!("{} features", self.n_features),
                format!("{} features", row.len()),
            ));
        }
        Ok(root.leaf_for(row))
    }

    /// Class probabilities for every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let dist = self.predict_proba_row(&row.to_vec())?;
            for (j, p) in dist.iter().enumerate() {
                proba[[i, j]] = *p;
            }
        }
        Ok(proba)
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => node_depth(node),
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => count_leaves(node),
        }
    }

    /// Structural check for trees that came from outside this process
    pub(crate) fn validate(&self, n_features: usize, n_classes: usize) -> Result<()> {
        let root = self.root.as_ref().ok_or_else(|| {
            PlacementError::ModelUnavailableError("tree has no root".to_string())
        })?;
        if self.n_features != n_features {
            return Err(PlacementError::shape(
                format!("tree over {} features", n_features),
                format!("{} features", self.n_features),
            ));
        }
        validate_node(root, n_features, n_classes)
    }
}

fn validate_node(node: &TreeNode, n_features: usize, n_classes: usize) -> Result<()> {
    let cover = node.cover();
    if !cover.is_finite() || cover <= 0.0 {
        return Err(PlacementError::ModelUnavailableError(format!(
            "node cover {} is not a positive mass",
            cover
        )));
    }

    match node {
        TreeNode::Leaf { distribution, .. } => {
            if distribution.len() != n_classes {
                return Err(PlacementError::ModelUnavailableError(format!(
                    "leaf distribution has {} entries, expected {}",
                    distribution.len(),
                    n_classes
                )));
            }
            let total: f64 = distribution.iter().sum();
            if distribution.iter().any(|p| !(0.0..=1.0).contains(p))
                || (total - 1.0).abs() > 1e-9
            {
                return Err(PlacementError::ModelUnavailableError(format!(
                    "leaf distribution {:?} is not a probability vector",
                    distribution
                )));
            }
            Ok(())
        }
        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
            if *feature_idx >= n_features || !threshold.is_finite() {
                return Err(PlacementError::ModelUnavailableError(format!(
                    "split on feature {} with threshold {}",
                    feature_idx, threshold
                )));
            }
            validate_node(left, n_features, n_classes)?;
            validate_node(right, n_features, n_classes)?;

            let children = left.cover() + right.cover();
            if (children - cover).abs() > 1e-9 * cover.max(1.0) {
                return Err(PlacementError::ModelUnavailableError(format!(
                    "split cover {} does not match its children ({})",
                    cover, children
                )));
            }
            Ok(())
        }
    }
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
    }
}

/// Recursive builder state for one fit
struct TreeBuilder<'a> {
    tree: &'a DecisionTree,
    x: &'a Array2<f64>,
    y: &'a [usize],
    w: &'a [f64],
    n_classes: usize,
    max_features: usize,
    rng: &'a mut ChaCha8Rng,
    importances: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let class_weights = self.class_weights(&indices);
        let cover: f64 = class_weights.iter().sum();
        let impurity = self.tree.criterion.impurity(&class_weights, cover);

        let should_stop = n_samples < self.tree.min_samples_split
            || n_samples < 2 * self.tree.min_samples_leaf
            || self.tree.max_depth.map_or(false, |d| depth >= d)
            || impurity <= MIN_GAIN;

        if should_stop {
            return self.leaf(class_weights, cover, n_samples);
        }

        let features = self.draw_features();
        let Some(split) = self.find_best_split(&indices, &features, &class_weights, cover, impurity)
        else {
            return self.leaf(class_weights, cover, n_samples);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, split.feature_idx]] <= split.threshold);

        self.importances[split.feature_idx] += split.gain;

        let left = Box::new(self.build(left_indices, depth + 1));
        let right = Box::new(self.build(right_indices, depth + 1));

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            cover,
            n_samples,
            impurity,
        }
    }

    fn leaf(&self, class_weights: Vec<f64>, cover: f64, n_samples: usize) -> TreeNode {
        let distribution = if cover > 0.0 {
            class_weights.iter().map(|w| w / cover).collect()
        } else {
            vec![1.0 / self.n_classes as f64; self.n_classes]
        };
        TreeNode::Leaf {
            distribution,
            cover,
            n_samples,
        }
    }

    fn class_weights(&self, indices: &[usize]) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_classes];
        for &i in indices {
            totals[self.y[i]] += self.w[i];
        }
        totals
    }

    /// Random visiting order over all features
    fn draw_features(&mut self) -> Vec<usize> {
        let n_features = self.x.ncols();
        if self.max_features >= n_features {
            return (0..n_features).collect();
        }
        rand::seq::index::sample(&mut *self.rng, n_features, n_features).into_vec()
    }

    /// Sort-and-sweep search. Visits features in the drawn order until
    /// `max_features` non-constant ones have been evaluated.
    fn find_best_split(
        &self,
        indices: &[usize],
        features: &[usize],
        class_weights: &[f64],
        cover: f64,
        impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.tree.min_samples_leaf.max(1);
        let parent_score = cover * impurity;
        let mut best: Option<SplitCandidate> = None;

        let mut order = indices.to_vec();
        let mut left = vec![0.0; self.n_classes];
        let mut right = vec![0.0; self.n_classes];

        let mut evaluated = 0;
        for &feature_idx in features {
            if evaluated >= self.max_features {
                break;
            }
            order.copy_from_slice(indices);
            order.sort_by(|&a, &b| self.x[[a, feature_idx]].total_cmp(&self.x[[b, feature_idx]]));

            let first = self.x[[order[0], feature_idx]];
            let last = self.x[[order[n - 1], feature_idx]];
            if first == last {
                continue;
            }
            evaluated += 1;

            left.iter_mut().for_each(|v| *v = 0.0);
            let mut left_cover = 0.0;

            for pos in 0..n - 1 {
                let i = order[pos];
                left[self.y[i]] += self.w[i];
                left_cover += self.w[i];

                let value = self.x[[i, feature_idx]];
                let next = self.x[[order[pos + 1], feature_idx]];
                if next <= value {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }

                for c in 0..self.n_classes {
                    right[c] = (class_weights[c] - left[c]).max(0.0);
                }
                let right_cover = (cover - left_cover).max(0.0);

                let child_score = left_cover * self.tree.criterion.impurity(&left, left_cover)
                    + right_cover * self.tree.criterion.impurity(&right, right_cover);
                let gain = parent_score - child_score;

                if gain > MIN_GAIN && best.map_or(true, |b| gain > b.gain) {
                    let mut threshold = value / 2.0 + next / 2.0;
                    if threshold >= next || !threshold.is_finite() {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}
