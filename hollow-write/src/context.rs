//! The population task's handle onto the write state engine.

use crate::engine::WriteStateEngine;
use crate::error::Result;
use hollow_core::{FieldValue, Ordinal, SchemaSet, WriteRecord};
use std::sync::Arc;

/// Scoped write access handed to the population task for one cycle.
///
/// The context carries the version being produced; all mutation goes
/// through the engine and obeys its seal.
pub struct WriteContext<'a> {
    engine: &'a mut WriteStateEngine,
    version: u64,
}

impl<'a> WriteContext<'a> {
    /// Create a context over `engine` for `version`.
    pub fn new(engine: &'a mut WriteStateEngine, version: u64) -> Self {
        Self { engine, version }
    }

    /// The version this cycle is producing.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The dataset's schema set.
    pub fn schemas(&self) -> &Arc<SchemaSet> {
        self.engine.schemas()
    }

    /// Stage a record. See [`WriteStateEngine::add`].
    pub fn add(&mut self, type_name: &str, record: WriteRecord) -> Result<Ordinal> {
        self.engine.add(type_name, record)
    }

    /// Unstage a record by content or key identity.
    pub fn remove(&mut self, type_name: &str, record: WriteRecord) -> Result<Option<Ordinal>> {
        self.engine.remove(type_name, record)
    }

    /// Unstage a keyed record by its primary-key tuple.
    pub fn remove_by_key(
        &mut self,
        type_name: &str,
        key_values: &[FieldValue],
    ) -> Result<Option<Ordinal>> {
        self.engine.remove_by_key(type_name, key_values)
    }
}
