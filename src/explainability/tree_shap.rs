//! Path-dependent TreeSHAP for the random forest
//!
//! Exact Shapley values of the cover-weighted conditional expectation, computed
//! in polynomial time by tracking, along each root-to-leaf path, the share of
//! feature subsets that flow through every node.

use super::attribution::{Attribution, Attributor, ClassAttributions};
use crate::error::{PlacementError, Result};
use crate::features::FeatureVector;
use crate::training::{RandomForest, TreeNode, POSITIVE_CLASS};
use serde::{Deserialize, Serialize};

/// Exact tree-structure attribution
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TreeShapAttributor;

impl TreeShapAttributor {
    pub fn new() -> Self {
        Self
    }

    /// Attributions for every class channel
    pub fn explain_classes(
        &self,
        model: &RandomForest,
        x: &FeatureVector,
    ) -> Result<ClassAttributions> {
        if !model.is_fitted() {
            return Err(PlacementError::ModelUnavailableError(
                "random forest is not fitted".to_string(),
            ));
        }
        if x.len() != model.n_features() {
            return Err(PlacementError::shape(
                format!("{} features", model.n_features()),
                format!("{} features", x.len()),
            ));
        }

        let n_classes = model.classes().len();
        let n_features = model.n_features();
        let scale = 1.0 / model.n_trees() as f64;
        let mut values = vec![vec![0.0; n_features]; n_classes];
        let mut base_values = vec![0.0; n_classes];

        for tree in model.trees() {
            let root = tree.root().ok_or_else(|| {
                PlacementError::ModelUnavailableError("tree has no root".to_string())
            })?;
            for (b, e) in base_values.iter_mut().zip(root.expected_value()) {
                *b += e * scale;
            }
            tree_shap(root, x.values(), &mut values, scale);
        }

        Ok(ClassAttributions {
            classes: model.classes().to_vec(),
            base_values,
            outputs: model.predict_proba_row(x.values())?,
            values,
            vector: x.clone(),
        })
    }
}

impl Attributor for TreeShapAttributor {
    fn name(&self) -> &'static str {
        "tree_shap"
    }

    fn explain(&self, model: &RandomForest, x: &FeatureVector) -> Result<Attribution> {
        self.explain_classes(model, x)?.select_class(POSITIVE_CLASS)
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` for the root placeholder
    feature: Option<usize>,
    /// Fraction of "feature absent" subsets that pass
    zero_fraction: f64,
    /// Fraction of "feature present" subsets that pass (1 or 0)
    one_fraction: f64,
    /// Permutation weight
    pweight: f64,
}

/// Add `phi[class][feature] += scale * shap(tree, x)` for one tree
pub(crate) fn tree_shap(root: &TreeNode, x: &[f64], phi: &mut [Vec<f64>], scale: f64) {
    recurse(root, x, Vec::new(), 1.0, 1.0, None, phi, scale);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    node: &TreeNode,
    x: &[f64],
    mut path: Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
    phi: &mut [Vec<f64>],
    scale: f64,
) {
    extend(&mut path, zero_fraction, one_fraction, feature);

    match node {
        TreeNode::Leaf { distribution, .. } => {
            for i in 1..path.len() {
                let el = path[i];
                let Some(f) = el.feature else { continue };
                let w = unwound_sum(&path, i) * (el.one_fraction - el.zero_fraction) * scale;
                for (channel, value) in phi.iter_mut().zip(distribution) {
                    channel[f] += w * value;
                }
            }
        }
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            cover,
            ..
        } => {
            let f = *feature_idx;
            let (hot, cold) = if x[f] <= *threshold {
                (left.as_ref(), right.as_ref())
            } else {
                (right.as_ref(), left.as_ref())
            };
            let (hot_zero, cold_zero) = if *cover > 0.0 {
                (hot.cover() / cover, cold.cover() / cover)
            } else {
                (0.5, 0.5)
            };

            // A feature seen earlier on the path is merged rather than repeated
            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = path.iter().position(|e| e.feature == Some(f)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind(&mut path, k);
            }

            // Branches no subset can reach contribute nothing
            let hot_zero = hot_zero * incoming_zero;
            if hot_zero > 0.0 || incoming_one > 0.0 {
                recurse(hot, x, path.clone(), hot_zero, incoming_one, Some(f), phi, scale);
            }
            let cold_zero = cold_zero * incoming_zero;
            if cold_zero > 0.0 {
                recurse(cold, x, path, cold_zero, 0.0, Some(f), phi, scale);
            }
        }
    }
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let d = depth as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i as f64 + 1.0) / (d + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (d - i as f64) / (d + 1.0);
    }
}

/// Remove element `index`, undoing its effect on the permutation weights
fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let d = depth as f64;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[index];
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (d + 1.0) / ((i as f64 + 1.0) * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (d - i as f64) / (d + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (d + 1.0) / (zero_fraction * (d - i as f64));
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight if element `index` were unwound
fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let d = depth as f64;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[index];
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (d + 1.0) / ((i as f64 + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (d - i as f64) / (d + 1.0);
        } else {
            total += path[i].pweight / zero_fraction / ((d - i as f64) / (d + 1.0));
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(p1: f64, cover: f64) -> Box<TreeNode> {
        Box::new(TreeNode::Leaf {
            distribution: vec![1.0 - p1, p1],
            cover,
            n_samples: cover as usize,
        })
    }

    fn split(feature_idx: usize, threshold: f64, left: Box<TreeNode>, right: Box<TreeNode>) -> TreeNode {
        let cover = left.cover() + right.cover();
        TreeNode::Split {
            feature_idx,
            threshold,
            n_samples: cover as usize,
            left,
            right,
            cover,
            impurity: 0.0,
        }
    }

    fn shap(node: &TreeNode, x: &[f64], n_features: usize) -> Vec<Vec<f64>> {
        let mut phi = vec![vec![0.0; n_features]; 2];
        tree_shap(node, x, &mut phi, 1.0);
        phi
    }

    #[test]
    fn test_stump() {
        let tree = split(0, 0.5, leaf(0.0, 3.0), leaf(1.0, 1.0));
        let phi = shap(&tree, &[0.0, 9.0], 2);

        // expected class-1 output is 0.25, the row lands on 0.0
        assert!((phi[1][0] + 0.25).abs() < 1e-12);
        assert_eq!(phi[1][1], 0.0);
        assert!((phi[0][0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_two_feature_interaction() {
        // x0 <= 0.5 ? (x1 <= 0.5 ? 0 : 1) : 1, uniform covers
        let tree = split(
            0,
            0.5,
            Box::new(split(1, 0.5, leaf(0.0, 1.0), leaf(1.0, 1.0))),
            Box::new(split(1, 0.5, leaf(1.0, 1.0), leaf(1.0, 1.0))),
        );
        let x = [0.0, 0.0];
        let phi = shap(&tree, &x, 2);

        // v({}) = 0.75, v({0}) = 0.5, v({1}) = 0.5, v({0,1}) = 0
        // phi_0 = 0.5*(0.5-0.75) + 0.5*(0-0.5) = -0.375, same for phi_1
        assert!((phi[1][0] + 0.375).abs() < 1e-12);
        assert!((phi[1][1] + 0.375).abs() < 1e-12);
        let total: f64 = phi[1].iter().sum();
        assert!((0.75 + total - tree.leaf_for(&x)[1]).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_feature_on_path() {
        // x0 split twice on the same path
        let tree = split(
            0,
            0.5,
            Box::new(split(0, 0.2, leaf(0.0, 1.0), leaf(0.5, 1.0))),
            leaf(1.0, 2.0),
        );
        for x in [[0.1], [0.3], [0.9]] {
            let phi = shap(&tree, &x, 1);
            let base = tree.expected_value()[1];
            assert!((base + phi[1][0] - tree.leaf_for(&x)[1]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unfitted_forest() {
        let forest = RandomForest::default();
        let schema = std::sync::Arc::new(crate::features::FeatureSchema::placement());
        let x = FeatureVector::from_row(schema, ndarray::Array1::zeros(8).view()).unwrap();
        assert!(matches!(
            TreeShapAttributor.explain(&forest, &x),
            Err(PlacementError::ModelUnavailableError(_))
        ));
    }
}
