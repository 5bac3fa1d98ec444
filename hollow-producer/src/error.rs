//! Error types for hollow-producer

use crate::validation::ValidationStatus;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Producer error type; one variant per cycle failure kind
#[derive(Error, Debug)]
pub enum Error {
    /// Shared core error
    #[error(transparent)]
    Core(#[from] hollow_core::Error),

    /// Write-side failure
    #[error(transparent)]
    Write(#[from] hollow_write::Error),

    /// Read-state construction failure
    #[error(transparent)]
    Read(#[from] hollow_read::Error),

    /// Blob codec failure
    #[error(transparent)]
    Blob(#[from] hollow_blob::Error),

    /// The user population task failed or panicked
    #[error("Populate failed: {0}")]
    Populate(String),

    /// The publisher rejected a blob
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Round-trip verification of the published artifacts failed
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// One or more validators did not pass
    #[error("One or more validations failed; check individual results")]
    Validation(ValidationStatus),

    /// The announcer rejected the version
    #[error("Announce failed: {0}")]
    Announce(String),

    /// Restore could not reach the requested version
    #[error("Restore failed: {0}")]
    Restore(String),

    /// A second cycle was started while one is in flight
    #[error("A cycle is already in flight")]
    CycleInFlight,
}

impl Error {
    /// Create a populate failure
    pub fn populate(msg: impl Into<String>) -> Self {
        Error::Populate(msg.into())
    }

    /// Create a publish failure
    pub fn publish(msg: impl Into<String>) -> Self {
        Error::Publish(msg.into())
    }

    /// Create an integrity failure
    pub fn integrity(msg: impl Into<String>) -> Self {
        Error::Integrity(msg.into())
    }

    /// Create an announce failure
    pub fn announce(msg: impl Into<String>) -> Self {
        Error::Announce(msg.into())
    }

    /// Create a restore failure
    pub fn restore(msg: impl Into<String>) -> Self {
        Error::Restore(msg.into())
    }
}
