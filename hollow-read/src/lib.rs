//! # hollow-read
//!
//! The read side of the dataset engine: compact immutable columnar states
//! per type, built by a batched freeze and served lock-free. The
//! [`TypeDataBuilder`] is the mutable intermediate every loading path
//! goes through: snapshot decode, delta application, and the canonical
//! freeze of a write state.

pub mod builder;
pub mod error;
pub mod rows;
pub mod state;

pub use builder::{freeze_engine, TypeDataBuilder};
pub use error::{Error, Result};
pub use rows::{MapTable, RecordRow, SetTable};
pub use state::{
    ListReadState, MapReadState, ObjectReadState, ReadStateEngine, SetReadState, TypeReadState,
};
