//! Error types for the placement pipeline

use thiserror::Error;

/// Result type alias for placement operations
pub type Result<T> = std::result::Result<T, PlacementError>;

/// Coarse error category, for callers that only need to branch on the kind of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Shape,
    InputValidation,
    ModelUnavailable,
    ClassSelection,
    Config,
    Data,
    Training,
    Io,
    Serialization,
}

/// Main error type for the placement pipeline
#[derive(Error, Debug)]
pub enum PlacementError {
    /// Wrong, missing or reordered fields
    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    /// Non-numeric or out-of-domain input
    #[error("Input validation error: {0}")]
    InputValidationError(String),

    /// Fitted artifact missing, corrupt or unfitted
    #[error("Model unavailable: {0}")]
    ModelUnavailableError(String),

    /// The positive-class channel could not be selected from a per-class output
    #[error("Class selection error: {0}")]
    ClassSelectionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PlacementError {
    /// Build a shape error from anything printable
    pub fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        PlacementError::ShapeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlacementError::ShapeError { .. } => ErrorKind::Shape,
            PlacementError::InputValidationError(_) => ErrorKind::InputValidation,
            PlacementError::ModelUnavailableError(_) => ErrorKind::ModelUnavailable,
            PlacementError::ClassSelectionError(_) => ErrorKind::ClassSelection,
            PlacementError::ConfigError(_) => ErrorKind::Config,
            PlacementError::DataError(_) => ErrorKind::Data,
            PlacementError::TrainingError(_) => ErrorKind::Training,
            PlacementError::IoError(_) => ErrorKind::Io,
            PlacementError::SerializationError(_) => ErrorKind::Serialization,
        }
    }
}

impl From<polars::error::PolarsError> for PlacementError {
    fn from(err: polars::error::PolarsError) -> Self {
        PlacementError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PlacementError {
    fn from(err: serde_json::Error) -> Self {
        PlacementError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PlacementError {
    fn from(err: ndarray::ShapeError) -> Self {
        PlacementError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
