//! Error types for hollow-read

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Read-side error type
#[derive(Error, Debug)]
pub enum Error {
    /// Shared core error (schema, record, type lookup)
    #[error(transparent)]
    Core(#[from] hollow_core::Error),

    /// Builder rows disagree with the schema variant
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}
