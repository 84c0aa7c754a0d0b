//! Error types for the chirashi-core library.

use thiserror::Error;

/// Main error type for the chirashi library.
#[derive(Error, Debug)]
pub enum ChirashiError {
    /// Extraction engine error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by the extraction engine.
///
/// Everything that can go wrong with a single token, price or record is
/// reported as a [`Rejection`](crate::models::record::Rejection) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// The OCR collaborator handed over no tokens at all.
    #[error("no OCR tokens in input")]
    EmptyInput,

    /// A tunable is outside its allowed range.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl ExtractionError {
    pub(crate) fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for the chirashi library.
pub type Result<T> = std::result::Result<T, ChirashiError>;
