//! Model training module
//!
//! Provides the fitting phase for the placement classifier:
//! - CART decision trees with weighted impurity and node covers
//! - Random forest with bootstrap sampling and balanced class weights
//! - Stratified train/test splitting
//! - Classification reports at a configurable threshold
//! - `Trainer`, which ties the above together

mod config;
mod trainer;
pub mod decision_tree;
pub mod metrics;
pub mod random_forest;
pub mod split;

pub use config::{TrainingConfig, DEFAULT_TARGET_COLUMN};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use metrics::{ClassMetrics, ClassificationReport, ConfusionCounts};
pub use random_forest::{ClassWeight, ForestParams, MaxFeatures, RandomForest, POSITIVE_CLASS};
pub use split::{shuffle_split, stratified_split, TrainTestSplit};
pub use trainer::{Trainer, TrainingOutcome};
