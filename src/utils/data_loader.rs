//! Data loading utilities

use crate::error::{PlacementError, Result};
use crate::features::FeatureSchema;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Feature matrix in schema order plus 0/1 labels
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: Arc<FeatureSchema>,
    x: Array2<f64>,
    y: Array1<f64>,
}

impl Dataset {
    /// Assemble a dataset from arrays whose columns follow the schema order
    pub fn new(schema: Arc<FeatureSchema>, x: Array2<f64>, y: Array1<f64>) -> Result<Self> {
        schema.ensure_width(x.ncols(), "dataset")?;
        if x.nrows() != y.len() {
            return Err(PlacementError::shape(
                format!("{} labels", x.nrows()),
                format!("{} labels", y.len()),
            ));
        }
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(PlacementError::DataError(format!(
                "labels must be 0 or 1, found {}",
                bad
            )));
        }
        Ok(Self { schema, x, y })
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    /// Share of rows labelled 1
    pub fn positive_rate(&self) -> f64 {
        if self.y.is_empty() {
            0.0
        } else {
            self.y.sum() / self.y.len() as f64
        }
    }
}

/// CSV loader for the fitting phase
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used for schema inference
    infer_schema_length: Option<usize>,
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
            separator: b',',
        }
    }

    /// Set the field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Read a CSV into a `DataFrame`
    pub fn read_frame(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PlacementError::DataError(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(self.separator);

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file);

        reader
            .finish()
            .map_err(|e| PlacementError::DataError(e.to_string()))
    }

    /// Load the schema columns (by name) and the label column from a CSV
    pub fn load_csv(
        &self,
        path: impl AsRef<Path>,
        schema: Arc<FeatureSchema>,
        target: &str,
    ) -> Result<Dataset> {
        let path = path.as_ref();
        let df = self.read_frame(path)?;
        let dataset = Self::frame_to_dataset(&df, schema, target)?;

        info!(
            path = %path.display(),
            rows = dataset.n_samples(),
            positive_rate = dataset.positive_rate(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Extract schema columns and labels from a frame. Extra columns are ignored.
    pub fn frame_to_dataset(
        df: &DataFrame,
        schema: Arc<FeatureSchema>,
        target: &str,
    ) -> Result<Dataset> {
        let n_rows = df.height();
        if n_rows == 0 {
            return Err(PlacementError::DataError("dataset has no rows".to_string()));
        }

        let present: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let missing: Vec<&str> = schema
            .names()
            .chain(std::iter::once(target))
            .filter(|name| !present.iter().any(|p| p == name))
            .collect();
        if !missing.is_empty() {
            return Err(PlacementError::shape(
                format!("columns {} and '{}'", schema, target),
                format!("missing [{}]", missing.join(", ")),
            ));
        }

        let col_data: Vec<Vec<f64>> = schema
            .names()
            .map(|name| numeric_column(df, name))
            .collect::<Result<Vec<_>>>()?;

        // Row-major construction from column-major data
        let x = Array2::from_shape_fn((n_rows, col_data.len()), |(r, c)| col_data[c][r]);
        let y = Array1::from_vec(numeric_column(df, target)?);

        Dataset::new(schema, x, y)
    }
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PlacementError::shape(format!("column '{}'", name), "no such column"))?;
    let as_f64 = column
        .cast(&DataType::Float64)
        .map_err(|e| PlacementError::InputValidationError(format!("column '{}': {}", name, e)))?;

    as_f64
        .f64()
        .map_err(|e| PlacementError::DataError(e.to_string()))?
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(PlacementError::InputValidationError(format!(
                "column '{}' row {} is empty or not numeric",
                name, row
            ))),
        })
        .collect()
}
