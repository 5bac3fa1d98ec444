//! Blob framing constants and handles.
//!
//! Frame layout, stable and versioned:
//!
//! ```text
//! <magic:4 = "HOLW"> <formatVersion:uvarint>
//! <schemaHeader> <typedSection x typeCount>
//! ```
//!
//! The schema header is the wire form of the full schema set. One typed
//! section follows per type, in schema order, each tagged with the blob's
//! kind.

use crate::error::Result;
use hollow_core::memory::{read_uvarint, write_uvarint};
use hollow_core::schema::wire::{read_schema_set, write_schema_set};
use hollow_core::{Error as CoreError, SchemaSet};

/// Leading magic bytes of every blob.
pub const BLOB_MAGIC: [u8; 4] = *b"HOLW";

/// The format version this build writes and accepts.
pub const FORMAT_VERSION: u64 = 1;

/// Typed-section tag for snapshot payloads.
pub const SECTION_SNAPSHOT: u8 = 0x10;
/// Typed-section tag for forward-delta payloads.
pub const SECTION_DELTA: u8 = 0x11;
/// Typed-section tag for reverse-delta payloads.
pub const SECTION_REVERSE_DELTA: u8 = 0x12;

/// The kind of payload a blob carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlobKind {
    Snapshot,
    Delta,
    ReverseDelta,
}

impl BlobKind {
    /// The typed-section tag for this kind.
    pub fn section_tag(self) -> u8 {
        match self {
            BlobKind::Snapshot => SECTION_SNAPSHOT,
            BlobKind::Delta => SECTION_DELTA,
            BlobKind::ReverseDelta => SECTION_REVERSE_DELTA,
        }
    }

    /// Parse a typed-section tag.
    pub fn from_section_tag(tag: u8) -> Result<Self> {
        match tag {
            SECTION_SNAPSHOT => Ok(BlobKind::Snapshot),
            SECTION_DELTA => Ok(BlobKind::Delta),
            SECTION_REVERSE_DELTA => Ok(BlobKind::ReverseDelta),
            other => {
                Err(CoreError::truncated(format!("unknown section tag 0x{other:02x}")).into())
            }
        }
    }
}

impl std::fmt::Display for BlobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobKind::Snapshot => write!(f, "snapshot"),
            BlobKind::Delta => write!(f, "delta"),
            BlobKind::ReverseDelta => write!(f, "reverse-delta"),
        }
    }
}

/// An in-memory blob handle: the framed bytes plus the versions they
/// connect. The engine owns this only until the publisher stages it.
#[derive(Clone, Debug)]
pub struct Blob {
    pub kind: BlobKind,
    /// Version the payload transitions from (0 for snapshots and new
    /// chains).
    pub from_version: u64,
    /// Version the payload transitions to.
    pub to_version: u64,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(kind: BlobKind, from_version: u64, to_version: u64, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            from_version,
            to_version,
            bytes,
        }
    }
}

/// Append the frame prefix: magic, format version, schema header.
pub(crate) fn write_frame_prefix(out: &mut Vec<u8>, schemas: &SchemaSet) {
    out.extend_from_slice(&BLOB_MAGIC);
    write_uvarint(out, FORMAT_VERSION);
    write_schema_set(out, schemas);
}

/// Read and check the frame prefix, returning the embedded schema set.
pub(crate) fn read_frame_prefix(input: &mut &[u8]) -> Result<SchemaSet> {
    if input.len() < 4 {
        return Err(CoreError::truncated("blob magic").into());
    }
    let (magic, rest) = input.split_at(4);
    if magic != BLOB_MAGIC {
        return Err(CoreError::BadMagic(format!("{magic:02x?}")).into());
    }
    *input = rest;
    let version = read_uvarint(input)?;
    if version != FORMAT_VERSION {
        return Err(CoreError::UnknownFormatVersion(version).into());
    }
    Ok(read_schema_set(input)?)
}
