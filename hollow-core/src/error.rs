//! Error types for hollow-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Schema could not be parsed or failed validation
    #[error("Malformed schema: {0}")]
    MalformedSchema(String),

    /// Input ended before a complete value could be read
    #[error("Truncated input: {0}")]
    Truncated(String),

    /// Blob format version is not supported by this build
    #[error("Unknown format version: {0}")]
    UnknownFormatVersion(u64),

    /// Blob magic bytes did not match
    #[error("Bad magic: {0}")]
    BadMagic(String),

    /// Blob schema header disagrees with the expected schema set
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Record payload does not fit its schema
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Named type is not part of the dataset
    #[error("Unknown type: {0}")]
    UnknownType(String),
}

impl Error {
    /// Create a malformed schema error
    pub fn malformed_schema(msg: impl Into<String>) -> Self {
        Error::MalformedSchema(msg.into())
    }

    /// Create a truncated input error
    pub fn truncated(msg: impl Into<String>) -> Self {
        Error::Truncated(msg.into())
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Error::SchemaMismatch(msg.into())
    }

    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Error::InvalidRecord(msg.into())
    }

    /// Create an unknown type error
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Error::UnknownType(name.into())
    }
}
