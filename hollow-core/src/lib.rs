//! # hollow-core
//!
//! Shared foundation of the hollow dataset engine: the schema model with
//! its binary wire form, packed memory primitives, ordinal bitsets, field
//! values, and record hashing.
//!
//! The engine's other crates build on these pieces:
//! - `hollow-write` stages records into per-type arenas,
//! - `hollow-read` serves immutable columnar states,
//! - `hollow-blob` frames snapshots and deltas,
//! - `hollow-producer` drives the publish cycle,
//! - `hollow-query` scans read states by field value.

pub mod bitset;
pub mod error;
pub mod hashing;
pub mod memory;
pub mod schema;
pub mod value;

/// A dense non-negative record identifier within a typed state.
pub type Ordinal = u32;

pub use bitset::{AtomicOrdinalBitSet, OrdinalBitSet};
pub use error::{Error, Result};
pub use hashing::{fnv1a64, hash_ordinal, mix};
pub use schema::{
    FieldType, HashKey, ListSchema, MapSchema, ObjectSchema, RecordKey, ResolvedKeyPath, Schema,
    SchemaField, SchemaSet, SetSchema,
};
pub use value::{FieldValue, WriteRecord};
