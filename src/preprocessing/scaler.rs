//! Standard (z-score) feature scaling

use crate::error::{PlacementError, Result};
use crate::features::{FeatureSchema, FeatureVector};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Fitted parameters for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub name: String,
    /// Training mean
    pub center: f64,
    /// Training standard deviation (population), 1.0 for constant fields
    pub scale: f64,
}

/// Standard scaler: `(x - mean) / std` per field.
///
/// Parameters are keyed by field name and stored in schema order. Once fitted
/// the scaler is never refitted; `transform` and `standardize` only apply the
/// stored parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    schema: FeatureSchema,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    /// Create an unfitted scaler for a schema
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit on a training matrix whose columns follow the schema order
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        self.schema.ensure_width(x.ncols(), "training matrix")?;
        if x.nrows() == 0 {
            return Err(PlacementError::TrainingError(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let params = self
            .schema
            .names()
            .zip(x.axis_iter(Axis(1)))
            .map(|(name, column)| {
                let mean = column.mean().unwrap_or(0.0);
                let std = column.std(0.0);
                ScalerParams {
                    name: name.to_string(),
                    center: mean,
                    scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
                }
            })
            .collect();

        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Fit and transform in one step (fitting phase only)
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Transform a matrix with the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.ensure_fitted()?;
        self.schema.ensure_width(x.ncols(), "matrix")?;

        let mut result = x.clone();
        for (mut column, params) in result.axis_iter_mut(Axis(1)).zip(&self.params) {
            column.mapv_inplace(|v| (v - params.center) / params.scale);
        }
        Ok(result)
    }

    /// Standardize one raw vector.
    ///
    /// The vector must carry the same schema the scaler was fitted with.
    pub fn standardize(&self, raw: &FeatureVector) -> Result<FeatureVector> {
        self.ensure_fitted()?;
        self.schema.ensure_matches(raw.schema(), "scaler")?;

        let values = raw
            .values()
            .iter()
            .zip(&self.params)
            .map(|(v, p)| (v - p.center) / p.scale)
            .collect();
        Ok(raw.with_values(values))
    }

    /// Map standardized values back to raw units
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.ensure_fitted()?;
        self.schema.ensure_width(x.ncols(), "matrix")?;

        let mut result = x.clone();
        for (mut column, params) in result.axis_iter_mut(Axis(1)).zip(&self.params) {
            column.mapv_inplace(|v| v * params.scale + params.center);
        }
        Ok(result)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Check stored parameters line up with the schema (used after deserialization)
    pub fn validate(&self) -> Result<()> {
        self.ensure_fitted()?;
        self.schema.ensure_width(self.params.len(), "scaler parameters")?;
        for (expected, params) in self.schema.names().zip(&self.params) {
            if expected != params.name {
                return Err(PlacementError::shape(
                    format!("scaler parameter '{}'", expected),
                    format!("'{}'", params.name),
                ));
            }
            if !params.center.is_finite() || !params.scale.is_finite() || params.scale == 0.0 {
                return Err(PlacementError::ModelUnavailableError(format!(
                    "scaler parameter '{}' is not usable",
                    params.name
                )));
            }
        }
        Ok(())
    }

    fn ensure_fitted(&self) -> Result<()> {
        if self.is_fitted {
            Ok(())
        } else {
            Err(PlacementError::ModelUnavailableError(
                "scaler is not fitted".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FieldSpec;
    use ndarray::array;
    use std::sync::Arc;

    fn two_field_schema() -> FeatureSchema {
        FeatureSchema::new(1, vec![FieldSpec::new("a"), FieldSpec::new("b")]).unwrap()
    }

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0], [5.0, 10.0]];
        let mut scaler = StandardScaler::new(two_field_schema());
        let result = scaler.fit_transform(&x).unwrap();

        let col = result.column(0);
        assert!(col.mean().unwrap().abs() < 1e-10);
        // population std of 1..=5 is sqrt(2)
        assert!((scaler.params()[0].scale - 2.0f64.sqrt()).abs() < 1e-12);
        // constant column keeps unit scale
        assert_eq!(scaler.params()[1].scale, 1.0);
        assert!(result.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_inverse_transform() {
        let x = array![[1.0, -3.0], [2.0, 0.5], [7.0, 4.0]];
        let mut scaler = StandardScaler::new(two_field_schema());
        let scaled = scaler.fit_transform(&x).unwrap();
        let restored = scaler.inverse_transform(&scaled).unwrap();

        for (o, r) in x.iter().zip(restored.iter()) {
            assert!((o - r).abs() < 1e-10);
        }
    }

    #[test]
    fn test_standardize_uses_fitted_params() {
        let x = array![[0.0, 0.0], [10.0, 4.0]];
        let schema = two_field_schema();
        let mut scaler = StandardScaler::new(schema.clone());
        scaler.fit(&x).unwrap();

        let raw = FeatureVector::from_named(Arc::new(schema), [("b", 2.0), ("a", 5.0)]).unwrap();
        let first = scaler.standardize(&raw).unwrap();
        let second = scaler.standardize(&raw).unwrap();
        assert_eq!(first, second);
        // both values sit at the training mean
        assert!(first.values().iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_unfitted_scaler() {
        let scaler = StandardScaler::new(two_field_schema());
        assert!(matches!(
            scaler.transform(&array![[1.0, 2.0]]),
            Err(PlacementError::ModelUnavailableError(_))
        ));
    }

    #[test]
    fn test_width_mismatch() {
        let mut scaler = StandardScaler::new(two_field_schema());
        assert!(matches!(
            scaler.fit(&array![[1.0, 2.0, 3.0]]),
            Err(PlacementError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_schema_mismatch_on_standardize() {
        let x = array![[0.0, 0.0], [10.0, 4.0]];
        let mut scaler = StandardScaler::new(two_field_schema());
        scaler.fit(&x).unwrap();

        let other = FeatureSchema::new(1, vec![FieldSpec::new("b"), FieldSpec::new("a")]).unwrap();
        let raw = FeatureVector::from_named(Arc::new(other), [("a", 1.0), ("b", 1.0)]).unwrap();
        assert!(matches!(
            scaler.standardize(&raw),
            Err(PlacementError::ShapeError { .. })
        ));
    }
}
