//! Error types for the river_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the river_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Input had no rows where at least one was required
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Input columns do not match the fitted station set
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Too few (or the wrong number of) rows for the requested operation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Non-numeric or empty cells in required columns
    #[error("Data quality: {0}")]
    DataQuality(String),

    /// Split fractions are negative or sum to more than 1
    #[error("Invalid fraction: {0}")]
    InvalidFraction(String),

    /// A persisted scaler or model artifact is missing, unreadable, or
    /// dimensionally incompatible with the configured pipeline
    #[error("Artifact load: {0}")]
    ArtifactLoad(String),

    /// The underlying regressor failed during training
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::DataQuality(format!("invalid CSV input: {}", err))
    }
}
