//! Model explainability module
//!
//! Per-case feature attribution for the placement forest:
//! - `TreeShapAttributor`: exact path-dependent TreeSHAP over the tree structure
//! - `SamplingAttributor`: model-agnostic permutation sampling
//! - `ContributionSummary`: absolute contributions for display

mod attribution;
mod local_explanations;
mod tree_shap;

pub use attribution::{
    Attribution, Attributor, ClassAttributions, ContributionSummary, FeatureContribution,
};
pub use local_explanations::SamplingAttributor;
pub use tree_shap::TreeShapAttributor;
