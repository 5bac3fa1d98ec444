//! Error types for hollow-write

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Write-side error type
#[derive(Error, Debug)]
pub enum Error {
    /// Shared core error (schema, record, type lookup)
    #[error(transparent)]
    Core(#[from] hollow_core::Error),

    /// Mutation attempted after `populate_complete`
    #[error("Write state is sealed: {0}")]
    Sealed(String),

    /// A referenced ordinal has no record in the target type
    #[error("Dangling reference: {0}")]
    DanglingReference(String),
}

impl Error {
    /// Create a sealed-state error
    pub fn sealed(msg: impl Into<String>) -> Self {
        Error::Sealed(msg.into())
    }

    /// Create a dangling reference error
    pub fn dangling(msg: impl Into<String>) -> Self {
        Error::DanglingReference(msg.into())
    }
}
