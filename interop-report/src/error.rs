#![forbid(unsafe_code)]

//! Errors raised while persisting or loading run summaries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// I/O related failures.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Summary (de)serialization failures.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;
