//! Error types for concord.

use thiserror::Error;

/// Result type for concord operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for concord operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Pairing configuration or stratification failed.
    #[error("Pairing error: {0}")]
    Pairing(String),

    /// Score table or score profile error.
    #[error("Score table error: {0}")]
    ScoreTable(String),

    /// Data model error.
    #[error("Core error: {0}")]
    Core(#[from] concord_core::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Profile deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The operation was cancelled.
    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// Create a pairing error.
    pub fn pairing(msg: impl Into<String>) -> Self {
        Error::Pairing(msg.into())
    }

    /// Create a score table error.
    pub fn score_table(msg: impl Into<String>) -> Self {
        Error::ScoreTable(msg.into())
    }
}
