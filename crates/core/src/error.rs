//! Core error types.

use thiserror::Error;

/// Errors produced by the workflow model and label selector parsing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("unsupported label selector: {0}")]
    UnsupportedSelector(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
