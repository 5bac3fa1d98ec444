//! # hollow-blob
//!
//! The blob layer: bit-exact framing of snapshots and deltas, the
//! per-cycle delta computation against the prior read state, and the
//! loaders that rebuild read states from blob bytes.

pub mod columns;
pub mod compute;
pub mod error;
pub mod format;
pub mod load;
pub mod section;

pub use compute::{builders_from_write, compute_cycle_blobs, CycleArtifacts};
pub use error::{Error, Result};
pub use format::{Blob, BlobKind, BLOB_MAGIC, FORMAT_VERSION};
pub use load::{apply_delta, load_snapshot};
