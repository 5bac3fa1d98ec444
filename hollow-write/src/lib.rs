//! # hollow-write
//!
//! The write-side staging engine. A population task adds records through a
//! [`WriteContext`]; the engine assigns dense ordinals, deduplicates by
//! content hash or primary key, and tracks the per-cycle populated, ghost,
//! and modified sets that the delta computer consumes.
//!
//! Mutation is exclusive to the populate stage: `populate_complete` seals
//! the engine until the next `prepare_for_write`.

pub mod context;
pub mod engine;
pub mod error;
pub mod state;

pub use context::WriteContext;
pub use engine::WriteStateEngine;
pub use error::{Error, Result};
pub use state::{StoredRecord, TypeWriteState};
