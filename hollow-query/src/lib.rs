//! # hollow-query
//!
//! Schema-aware equality scans over immutable read states: ordinal-bitset
//! field matching with single-field reference traversal, in sequential
//! and work-stealing parallel variants over a shared scan pool.

pub mod pool;
pub mod query;

pub use pool::ScanPool;
pub use query::FieldMatchQuery;
