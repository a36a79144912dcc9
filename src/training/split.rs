//! Train/test splitting

use crate::error::{PlacementError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Row indices of a single train/test partition
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl TrainTestSplit {
    /// Materialize the partition as `(x_train, x_test, y_train, y_test)`
    pub fn apply(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> (Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>) {
        (
            x.select(Axis(0), &self.train_indices),
            x.select(Axis(0), &self.test_indices),
            y.select(Axis(0), &self.train_indices),
            y.select(Axis(0), &self.test_indices),
        )
    }
}

fn check_test_size(n_samples: usize, test_size: f64) -> Result<usize> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PlacementError::ConfigError(format!(
            "test_size must lie in (0, 1), got {}",
            test_size
        )));
    }
    let n_test = (n_samples as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(PlacementError::ConfigError(format!(
            "test_size {} leaves an empty partition for {} samples",
            test_size, n_samples
        )));
    }
    Ok(n_test)
}

/// Shuffled split without regard to labels
pub fn shuffle_split(n_samples: usize, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    let n_test = check_test_size(n_samples, test_size)?;
    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut test_indices = indices[..n_test].to_vec();
    let mut train_indices = indices[n_test..].to_vec();
    test_indices.sort_unstable();
    train_indices.sort_unstable();
    Ok(TrainTestSplit {
        train_indices,
        test_indices,
    })
}

/// Split that keeps each class's share the same in both partitions.
///
/// The test partition holds `ceil(n * test_size)` rows. Each class receives
/// its proportional share rounded down, and the leftover rows go to the
/// classes with the largest remainders.
pub fn stratified_split(y: &Array1<f64>, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    let n_samples = y.len();
    let n_test = check_test_size(n_samples, test_size)?;

    // Group samples by class
    let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &val) in y.iter().enumerate() {
        class_indices.entry(val.round() as i64).or_default().push(idx);
    }
    if class_indices.values().any(|idx| idx.len() < 2) {
        return Err(PlacementError::DataError(
            "every class needs at least 2 rows for a stratified split".to_string(),
        ));
    }

    if n_test > n_samples - class_indices.len() {
        return Err(PlacementError::ConfigError(format!(
            "test_size {} leaves some class without training rows",
            test_size
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for indices in class_indices.values_mut() {
        indices.shuffle(&mut rng);
    }

    // Proportional allocation with largest-remainder rounding
    let exact: Vec<f64> = class_indices
        .values()
        .map(|idx| n_test as f64 * idx.len() as f64 / n_samples as f64)
        .collect();
    let mut allocation: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let mut leftover = n_test - allocation.iter().sum::<usize>();
    let mut by_remainder: Vec<usize> = (0..exact.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        (exact[b] - exact[b].floor()).total_cmp(&(exact[a] - exact[a].floor()))
    });
    for &class in by_remainder.iter().cycle() {
        if leftover == 0 {
            break;
        }
        let available = class_indices.values().nth(class).map_or(0, |v| v.len() - 1);
        if allocation[class] < available {
            allocation[class] += 1;
            leftover -= 1;
        }
    }

    let mut train_indices = Vec::with_capacity(n_samples - n_test);
    let mut test_indices = Vec::with_capacity(n_test);
    for (indices, &take) in class_indices.values().zip(&allocation) {
        test_indices.extend_from_slice(&indices[..take]);
        train_indices.extend_from_slice(&indices[take..]);
    }
    train_indices.sort_unstable();
    test_indices.sort_unstable();

    Ok(TrainTestSplit {
        train_indices,
        test_indices,
    })
}
