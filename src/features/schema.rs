//! Versioned, ordered feature schema

use crate::error::{PlacementError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field names of the placement model, in fitting order
pub const PLACEMENT_FEATURES: [&str; 8] = [
    "work_experience_months",
    "backlogs",
    "soft_skill_score",
    "technical_skill_score",
    "certifications",
    "entrance_exam_score",
    "internship_count",
    "live_projects",
];

/// Current version of the placement schema
pub const PLACEMENT_SCHEMA_VERSION: u32 = 1;

/// A single named input field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, authoritative at every boundary
    pub name: String,
    /// Smallest accepted raw value (inclusive)
    #[serde(default)]
    pub min: Option<f64>,
}

impl FieldSpec {
    /// Field without a domain bound
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min: None,
        }
    }

    /// Set the inclusive lower bound
    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }
}

/// Ordered set of named fields shared by the normalizer and the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    /// Create a schema, rejecting empty or duplicated field lists
    pub fn new(version: u32, fields: Vec<FieldSpec>) -> Result<Self> {
        if fields.is_empty() {
            return Err(PlacementError::shape("at least one field", "0 fields"));
        }
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(PlacementError::shape(
                    "unique field names",
                    format!("duplicate field '{}'", field.name),
                ));
            }
        }
        Ok(Self { version, fields })
    }

    /// The 8-field placement schema; every raw value is a count or score and must be >= 0
    pub fn placement() -> Self {
        Self {
            version: PLACEMENT_SCHEMA_VERSION,
            fields: PLACEMENT_FEATURES
                .iter()
                .map(|name| FieldSpec::new(*name).with_min(0.0))
                .collect(),
        }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Field names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Position of a field by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Name of the field at `idx`
    pub fn name_at(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(|f| f.name.as_str())
    }

    /// Fail with `ShapeError` unless `other` has the same version, names and order
    pub fn ensure_matches(&self, other: &FeatureSchema, context: &str) -> Result<()> {
        if self == other {
            return Ok(());
        }
        Err(PlacementError::shape(
            format!("{} schema {}", context, self),
            other.to_string(),
        ))
    }

    /// Fail with `ShapeError` unless a matrix/vector width equals the field count
    pub fn ensure_width(&self, width: usize, context: &str) -> Result<()> {
        if width == self.len() {
            return Ok(());
        }
        Err(PlacementError::shape(
            format!("{} with {} features", context, self.len()),
            format!("{} features", width),
        ))
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{} [", self.version)?;
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", name)?;
        }
        write!(f, "]")
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::placement()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_schema_order() {
        let schema = FeatureSchema::placement();
        assert_eq!(schema.len(), 8);
        assert_eq!(schema.name_at(0), Some("work_experience_months"));
        assert_eq!(schema.index_of("backlogs"), Some(1));
        assert_eq!(schema.index_of("live_projects"), Some(7));
        assert_eq!(schema.index_of("cgpa"), None);
    }

    #[test]
    fn test_duplicate_fields_rejected() {
        let fields = vec![FieldSpec::new("a"), FieldSpec::new("a")];
        assert!(matches!(
            FeatureSchema::new(1, fields),
            Err(PlacementError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_reordered_schema_mismatch() {
        let schema = FeatureSchema::placement();
        let mut fields = schema.fields().to_vec();
        fields.swap(0, 1);
        let reordered = FeatureSchema::new(schema.version, fields).unwrap();

        let err = schema.ensure_matches(&reordered, "model").unwrap_err();
        assert!(matches!(err, PlacementError::ShapeError { .. }));
        assert!(schema.ensure_matches(&FeatureSchema::placement(), "model").is_ok());
    }

    #[test]
    fn test_version_mismatch() {
        let mut other = FeatureSchema::placement();
        other.version = 2;
        assert!(FeatureSchema::placement().ensure_matches(&other, "scaler").is_err());
    }

    #[test]
    fn test_display() {
        let schema = FeatureSchema::new(3, vec![FieldSpec::new("x"), FieldSpec::new("y")]).unwrap();
        assert_eq!(schema.to_string(), "v3 [x, y]");
    }
}
