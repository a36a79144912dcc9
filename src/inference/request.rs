//! Inference requests and their validation

use crate::error::{PlacementError, Result};
use crate::features::{FeatureSchema, FeatureVector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A single-case request: field name to raw value, as received
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionRequest {
    fields: Map<String, Value>,
}

impl PredictionRequest {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Parse a JSON object
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| PlacementError::InputValidationError(format!("invalid JSON: {}", e)))?;
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(PlacementError::shape(
                "a JSON object of named fields",
                json_type(&other),
            )),
        }
    }

    /// Text key/value pairs, e.g. from a form
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), Value::String(v.into())))
                .collect(),
        }
    }

    /// Numeric key/value pairs
    pub fn from_values<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| {
                    let value = serde_json::Number::from_f64(v)
                        .map(Value::Number)
                        .unwrap_or_else(|| Value::String(v.to_string()));
                    (k.to_string(), value)
                })
                .collect(),
        }
    }

    /// Set or replace one field
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Check the request against a schema and build the raw vector.
    ///
    /// Names are checked first (`ShapeError`), then every value must be numeric
    /// (`InputValidationError`), then finite and within the field's bound.
    pub fn validate(&self, schema: &Arc<FeatureSchema>) -> Result<FeatureVector> {
        let missing: Vec<&str> = schema
            .names()
            .filter(|name| !self.fields.contains_key(*name))
            .collect();
        let unknown: Vec<&str> = self
            .fields
            .keys()
            .map(String::as_str)
            .filter(|name| schema.index_of(name).is_none())
            .collect();
        if !missing.is_empty() || !unknown.is_empty() {
            let mut actual = Vec::new();
            if !missing.is_empty() {
                actual.push(format!("missing [{}]", missing.join(", ")));
            }
            if !unknown.is_empty() {
                actual.push(format!("unknown [{}]", unknown.join(", ")));
            }
            return Err(PlacementError::shape(
                format!("fields {}", schema),
                actual.join("; "),
            ));
        }

        let mut pairs = Vec::with_capacity(schema.len());
        for field in schema.fields() {
            let raw = &self.fields[field.name.as_str()];
            pairs.push((field.name.as_str(), parse_number(&field.name, raw)?));
        }

        for (field, (_, value)) in schema.fields().iter().zip(&pairs) {
            if !value.is_finite() {
                return Err(PlacementError::InputValidationError(format!(
                    "field '{}' must be finite, got {}",
                    field.name, value
                )));
            }
            if let Some(min) = field.min {
                if *value < min {
                    return Err(PlacementError::InputValidationError(format!(
                        "field '{}' must be at least {}, got {}",
                        field.name, min, value
                    )));
                }
            }
        }

        FeatureVector::from_named(Arc::clone(schema), pairs)
    }
}

fn parse_number(name: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        PlacementError::InputValidationError(format!(
            "field '{}' is not numeric: {}",
            name, value
        ))
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
