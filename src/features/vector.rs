//! Named feature vectors

use super::FeatureSchema;
use crate::error::{PlacementError, Result};
use ndarray::{Array1, ArrayView1};
use std::sync::Arc;

/// Values for every schema field, always stored in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema: Arc<FeatureSchema>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Build from `(name, value)` pairs in any order.
    ///
    /// Every schema field must appear exactly once and no other name may appear;
    /// anything else is a `ShapeError`.
    pub fn from_named<'a, I>(schema: Arc<FeatureSchema>, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut slots: Vec<Option<f64>> = vec![None; schema.len()];
        let mut unknown = Vec::new();

        for (name, value) in pairs {
            match schema.index_of(name) {
                Some(idx) if slots[idx].is_some() => {
                    return Err(PlacementError::shape(
                        "each field once",
                        format!("field '{}' supplied twice", name),
                    ));
                }
                Some(idx) => slots[idx] = Some(value),
                None => unknown.push(name.to_string()),
            }
        }

        let missing: Vec<&str> = slots
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .filter_map(|(i, _)| schema.name_at(i))
            .collect();

        if !missing.is_empty() || !unknown.is_empty() {
            return Err(PlacementError::shape(
                format!("fields {}", schema),
                describe_mismatch(&missing, &unknown),
            ));
        }

        let values = slots.into_iter().flatten().collect();
        Ok(Self { schema, values })
    }

    /// Build from a positional row already in schema order (fitting phase, matrices)
    pub fn from_row(schema: Arc<FeatureSchema>, row: ArrayView1<'_, f64>) -> Result<Self> {
        schema.ensure_width(row.len(), "row")?;
        Ok(Self {
            schema,
            values: row.to_vec(),
        })
    }

    /// Same schema, new values in schema order
    pub(crate) fn with_values(&self, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.values.len());
        Self {
            schema: Arc::clone(&self.schema),
            values,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn schema_arc(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    /// Value of a field by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.index_of(name).map(|i| self.values[i])
    }

    /// Values in schema order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.schema.names().zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_array(&self) -> Array1<f64> {
        Array1::from_vec(self.values.clone())
    }
}

fn describe_mismatch(missing: &[&str], unknown: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing [{}]", missing.join(", ")));
    }
    if !unknown.is_empty() {
        parts.push(format!("unknown [{}]", unknown.join(", ")));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::PLACEMENT_FEATURES;
    use ndarray::array;

    fn schema() -> Arc<FeatureSchema> {
        Arc::new(FeatureSchema::placement())
    }

    #[test]
    fn test_from_named_any_order() {
        let forward: Vec<(&str, f64)> = PLACEMENT_FEATURES
            .iter()
            .enumerate()
            .map(|(i, n)| (*n, i as f64))
            .collect();
        let mut backward = forward.clone();
        backward.reverse();

        let a = FeatureVector::from_named(schema(), forward).unwrap();
        let b = FeatureVector::from_named(schema(), backward).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get("backlogs"), Some(1.0));
        assert_eq!(a.values()[7], 7.0);
    }

    #[test]
    fn test_missing_field_is_shape_error() {
        let pairs = PLACEMENT_FEATURES
            .iter()
            .filter(|n| **n != "backlogs")
            .map(|n| (*n, 1.0));
        let err = FeatureVector::from_named(schema(), pairs).unwrap_err();
        match err {
            PlacementError::ShapeError { actual, .. } => assert!(actual.contains("backlogs")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_field_is_shape_error() {
        let pairs = PLACEMENT_FEATURES
            .iter()
            .map(|n| (*n, 1.0))
            .chain(std::iter::once(("cgpa", 8.1)));
        assert!(matches!(
            FeatureVector::from_named(schema(), pairs),
            Err(PlacementError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_duplicate_field_is_shape_error() {
        let pairs = PLACEMENT_FEATURES
            .iter()
            .map(|n| (*n, 1.0))
            .chain(std::iter::once(("backlogs", 2.0)));
        assert!(FeatureVector::from_named(schema(), pairs).is_err());
    }

    #[test]
    fn test_from_row_checks_width() {
        let row = array![1.0, 2.0, 3.0];
        assert!(FeatureVector::from_row(schema(), row.view()).is_err());

        let row = array![9.0, 16.0, 73.0, 94.0, 4.0, 73.0, 3.0, 3.0];
        let v = FeatureVector::from_row(schema(), row.view()).unwrap();
        assert_eq!(v.get("technical_skill_score"), Some(94.0));
        let names: Vec<&str> = v.iter().map(|(n, _)| n).collect();
        assert_eq!(names, PLACEMENT_FEATURES.to_vec());
    }
}
