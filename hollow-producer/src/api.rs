//! External collaborator interfaces.
//!
//! The producer consumes a [`Publisher`] and an [`Announcer`] during the
//! cycle, and a [`BlobRetriever`] during the optional restore. These are
//! the pluggable seams to an artifact store and an announcement endpoint;
//! the engine owns blobs only until `stage` accepts them.

use crate::error::Result;
use hollow_blob::{Blob, BlobKind};

/// Opaque handle to a staged blob.
#[derive(Clone, Debug)]
pub struct BlobHandle {
    pub kind: BlobKind,
    pub from_version: u64,
    pub to_version: u64,
    /// Store-private token.
    pub token: u64,
}

/// Destination for produced blobs. `stage` is idempotent and may be
/// retried by the caller; `publish` makes the staged blob externally
/// visible.
pub trait Publisher: Send + Sync {
    fn stage(&self, blob: &Blob) -> Result<BlobHandle>;
    fn publish(&self, handle: &BlobHandle) -> Result<()>;
}

/// Version announcement endpoint. `announce` is atomic: afterwards every
/// consumer polling the endpoint sees the new version.
pub trait Announcer: Send + Sync {
    fn announce(&self, version: u64) -> Result<()>;
}

/// Source of previously published blobs, consumed during restore.
pub trait BlobRetriever: Send + Sync {
    /// The latest snapshot at or below `version`: `(version, bytes)`.
    fn retrieve_snapshot(&self, version: u64) -> Result<(u64, Vec<u8>)>;

    /// The forward delta departing `from_version`: `(to_version, bytes)`.
    fn retrieve_delta(&self, from_version: u64) -> Result<Option<(u64, Vec<u8>)>>;

    /// The reverse delta departing `from_version`: `(to_version, bytes)`.
    fn retrieve_reverse_delta(&self, from_version: u64) -> Result<Option<(u64, Vec<u8>)>>;
}

/// Discards every blob; the default publisher.
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn stage(&self, blob: &Blob) -> Result<BlobHandle> {
        Ok(BlobHandle {
            kind: blob.kind,
            from_version: blob.from_version,
            to_version: blob.to_version,
            token: 0,
        })
    }

    fn publish(&self, _handle: &BlobHandle) -> Result<()> {
        Ok(())
    }
}

/// Accepts every announcement; the default announcer.
pub struct NullAnnouncer;

impl Announcer for NullAnnouncer {
    fn announce(&self, _version: u64) -> Result<()> {
        Ok(())
    }
}
