//! # hollow-producer
//!
//! The producer cycle engine. A [`Producer`] re-publishes an in-memory
//! dataset on a repeating cycle: the user task populates the write state,
//! the engine computes snapshot and delta blobs, verifies them by
//! round-trip, runs validators, and announces the new version. Stage
//! events fan out to heterogeneous [`ProducerListener`]s with panic
//! isolation.
//!
//! ```no_run
//! use hollow_core::{FieldType, FieldValue, Schema, SchemaField, SchemaSet, WriteRecord};
//! use hollow_producer::{MemoryAnnouncer, MemoryBlobStore, Producer};
//! use std::sync::Arc;
//!
//! let schemas = Arc::new(SchemaSet::new(vec![Schema::object(
//!     "Movie",
//!     [
//!         SchemaField::new("id", FieldType::Int),
//!         SchemaField::new("title", FieldType::String),
//!     ],
//! )])?);
//! let store = Arc::new(MemoryBlobStore::new());
//! let announcer = Arc::new(MemoryAnnouncer::new());
//! let mut producer = Producer::builder(schemas)
//!     .with_publisher(store)
//!     .with_announcer(announcer)
//!     .build()?;
//!
//! producer.run_cycle(|ctx| {
//!     ctx.add(
//!         "Movie",
//!         WriteRecord::Object(vec![FieldValue::Int(1), FieldValue::Str("Alpha".into())]),
//!     )?;
//!     Ok(())
//! })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api;
pub mod error;
pub mod listeners;
pub mod memory;
pub mod producer;
pub mod validation;
pub mod version;

pub use api::{Announcer, BlobHandle, BlobRetriever, NullAnnouncer, NullPublisher, Publisher};
pub use error::{Error, Result};
pub use listeners::{
    CycleSkipReason, ProducerListener, ProducerStatus, PublishStatus, RestoreStatus,
};
pub use memory::{MemoryAnnouncer, MemoryBlobStore};
pub use producer::{CycleOutcome, PopulateResult, Producer, ProducerBuilder};
pub use validation::{ValidationResult, ValidationResultType, ValidationStatus, Validator};
pub use version::{SequentialVersionMinter, VersionMinter, WallClockVersionMinter};
