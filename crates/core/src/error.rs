//! Pipeline error model.

use thiserror::Error;

/// Result type used across the forecasting pipeline.
pub type ForecastResult<T> = Result<T, ForecastError>;

/// Pipeline-level error.
///
/// Every variant is fatal for the run that produced it. The pipeline is a
/// deterministic batch computation, so nothing here is retried and nothing is
/// silently replaced by a default: a missing column coerced to zero would
/// corrupt reorder decisions downstream without anyone noticing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForecastError {
    /// A required source column is absent from the input table.
    #[error("missing required column: {0}")]
    MissingColumn(String),

    /// The model expects a feature the synthesized row cannot supply
    /// (training/inference feature-set drift).
    #[error("model expects unknown feature column: {0}")]
    UnknownFeatureColumn(String),

    /// A tunable is out of range. Raised at configuration time, never clamped.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A categorical value has no code in the training-time encoding.
    #[error("value {value:?} of column {column} is not in the category encoding")]
    UnknownCategory { column: String, value: String },

    /// A source cell could not be parsed.
    #[error("invalid value {value:?} in column {column} (row {row})")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    /// Model and feature builder disagree on the feature schema version.
    #[error("feature schema mismatch (builder: v{expected}, model: v{found})")]
    SchemaMismatch { expected: u32, found: u32 },

    /// Model was fitted against a different category encoding than the one
    /// loaded for inference.
    #[error("category encoding mismatch (loaded: v{expected}, model: v{found})")]
    EncodingMismatch { expected: u32, found: u32 },

    /// Reading or writing a persisted artifact failed.
    #[error("artifact error: {0}")]
    Artifact(String),
}

impl ForecastError {
    pub fn missing_column(name: impl Into<String>) -> Self {
        Self::MissingColumn(name.into())
    }

    pub fn unknown_feature(name: impl Into<String>) -> Self {
        Self::UnknownFeatureColumn(name.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn unknown_category(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnknownCategory {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn invalid_value(column: impl Into<String>, row: usize, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.into(),
            row,
            value: value.into(),
        }
    }

    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }
}
