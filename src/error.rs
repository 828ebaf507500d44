//! Error types for stacking-cv

use thiserror::Error;

/// Result type alias for stacking-cv operations
pub type Result<T> = std::result::Result<T, StackingError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum StackingError {
    /// Incompatible options, e.g. weights requested for a learner that cannot use them
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Inputs were not plain numeric arrays
    #[error("Input type error: {0}")]
    InputTypeError(String),

    #[error(
        "This {estimator} instance is not fitted yet. Call 'fit' with appropriate \
         arguments before using this method."
    )]
    NotFitted { estimator: String },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StackingError {
    /// Shorthand for the not-fitted error of a named estimator
    pub fn not_fitted(estimator: impl Into<String>) -> Self {
        StackingError::NotFitted {
            estimator: estimator.into(),
        }
    }

    pub(crate) fn length_mismatch(what: &str, expected: usize, actual: usize) -> Self {
        StackingError::ShapeError {
            expected: format!("{} length = {}", what, expected),
            actual: format!("{} length = {}", what, actual),
        }
    }
}

impl From<serde_json::Error> for StackingError {
    fn from(err: serde_json::Error) -> Self {
        StackingError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for StackingError {
    fn from(err: ndarray::ShapeError) -> Self {
        StackingError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for StackingError {
    fn from(err: polars::error::PolarsError) -> Self {
        StackingError::DataError(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for StackingError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        StackingError::ThreadPoolError(err.to_string())
    }
}
