//! Error types for hollow-blob

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Blob codec error type
#[derive(Error, Debug)]
pub enum Error {
    /// Shared core error (framing, schema, varint)
    #[error(transparent)]
    Core(#[from] hollow_core::Error),

    /// Read-state construction failed
    #[error(transparent)]
    ReadState(#[from] hollow_read::Error),

    /// Write-state access failed while computing blobs
    #[error(transparent)]
    WriteState(#[from] hollow_write::Error),
}
