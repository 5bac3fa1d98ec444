//! The cycle orchestrator.
//!
//! One producer owns the write state engine and the currently announced
//! read state, and drives each cycle through the staged pipeline:
//!
//! ```text
//! skip? → CYCLE_START → POPULATE → (no changes → NO_DELTA)
//!       → PUBLISH → INTEGRITY → VALIDATE → ANNOUNCE → CYCLE_COMPLETE
//! ```
//!
//! A failing stage short-circuits to a failed completion; later stages do
//! not run for that version. The cycle runs on a single driver thread,
//! and the only blocking points are the publisher/announcer calls and the
//! user's population task. Consumers observe promotion as one `Arc` swap.

use crate::api::{Announcer, BlobRetriever, NullAnnouncer, NullPublisher, Publisher};
use crate::error::{Error, Result};
use crate::listeners::{
    panic_message, CycleSkipReason, ListenerSupport, ProducerListener, PublishStatus,
    RestoreStatus, StatusBuilder,
};
use crate::validation::Validator;
use crate::version::{VersionMinter, WallClockVersionMinter};
use hollow_blob::{apply_delta, compute_cycle_blobs, load_snapshot, Blob, CycleArtifacts};
use hollow_core::{Ordinal, SchemaSet, WriteRecord};
use hollow_read::{ReadStateEngine, RecordRow};
use hollow_write::{WriteContext, WriteStateEngine};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The population task's result; any error fails the cycle at populate.
pub type PopulateResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// How a cycle ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Not the primary producer; state untouched.
    Skipped,
    /// Population made no changes; the prior version remains current.
    NoDelta { version: u64 },
    /// A new version was published and announced.
    Announced { version: u64 },
}

/// Builder for [`Producer`].
pub struct ProducerBuilder {
    schemas: Arc<SchemaSet>,
    publisher: Arc<dyn Publisher>,
    announcer: Arc<dyn Announcer>,
    minter: Arc<dyn VersionMinter>,
    primary_check: Arc<dyn Fn() -> bool + Send + Sync>,
    listeners: Vec<Arc<dyn ProducerListener>>,
    validators: Vec<Arc<dyn Validator>>,
}

impl ProducerBuilder {
    /// Replace the default (discarding) publisher.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Replace the default (accepting) announcer.
    pub fn with_announcer(mut self, announcer: Arc<dyn Announcer>) -> Self {
        self.announcer = announcer;
        self
    }

    /// Replace the wall-clock version minter.
    pub fn with_version_minter(mut self, minter: Arc<dyn VersionMinter>) -> Self {
        self.minter = minter;
        self
    }

    /// Supply the primary-producer predicate checked at cycle entry.
    pub fn with_primary_producer_check(
        mut self,
        check: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.primary_check = Arc::new(check);
        self
    }

    /// Register a stage-event listener.
    pub fn with_listener(mut self, listener: Arc<dyn ProducerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Register a read-state validator.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Build the producer and fire `on_producer_init`.
    pub fn build(self) -> Result<Producer> {
        let start = Instant::now();
        let write_engine = WriteStateEngine::new(self.schemas.clone())?;
        let listeners = ListenerSupport::new();
        for listener in self.listeners {
            listeners.add_listener(listener);
        }
        for validator in self.validators {
            listeners.add_validator(validator);
        }
        let producer = Producer {
            schemas: self.schemas,
            write_engine,
            listeners,
            publisher: self.publisher,
            announcer: self.announcer,
            minter: self.minter,
            primary_check: self.primary_check,
            current: None,
            current_version: 0,
            pending_version: None,
            cycle_in_flight: false,
        };
        producer
            .listeners
            .fire_producer_init(start.elapsed().as_millis() as u64);
        Ok(producer)
    }
}

/// The producer cycle engine.
pub struct Producer {
    schemas: Arc<SchemaSet>,
    write_engine: WriteStateEngine,
    listeners: ListenerSupport,
    publisher: Arc<dyn Publisher>,
    announcer: Arc<dyn Announcer>,
    minter: Arc<dyn VersionMinter>,
    primary_check: Arc<dyn Fn() -> bool + Send + Sync>,
    /// The announced read state; rotated on promotion.
    current: Option<Arc<ReadStateEngine>>,
    current_version: u64,
    /// A minted version not yet consumed by a successful announce.
    pending_version: Option<u64>,
    cycle_in_flight: bool,
}

impl Producer {
    /// Start building a producer over `schemas`.
    pub fn builder(schemas: Arc<SchemaSet>) -> ProducerBuilder {
        ProducerBuilder {
            schemas,
            publisher: Arc::new(NullPublisher),
            announcer: Arc::new(NullAnnouncer),
            minter: Arc::new(WallClockVersionMinter::new()),
            primary_check: Arc::new(|| true),
            listeners: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// The dataset's schema set.
    pub fn schemas(&self) -> &Arc<SchemaSet> {
        &self.schemas
    }

    /// The currently announced read state, if any cycle has announced.
    pub fn read_state(&self) -> Option<Arc<ReadStateEngine>> {
        self.current.clone()
    }

    /// The currently announced version (0 before the first announce).
    pub fn current_version(&self) -> u64 {
        self.current_version
    }

    /// Register a listener after construction.
    pub fn add_listener(&self, listener: Arc<dyn ProducerListener>) {
        self.listeners.add_listener(listener);
    }

    /// Remove a registered listener.
    pub fn remove_listener(&self, listener: &Arc<dyn ProducerListener>) {
        self.listeners.remove_listener(listener);
    }

    /// Register a validator after construction.
    pub fn add_validator(&self, validator: Arc<dyn Validator>) {
        self.listeners.add_validator(validator);
    }

    /// Run one producer cycle around the population task.
    pub fn run_cycle<F>(&mut self, task: F) -> Result<CycleOutcome>
    where
        F: FnOnce(&mut WriteContext<'_>) -> PopulateResult,
    {
        if self.cycle_in_flight {
            return Err(Error::CycleInFlight);
        }
        if !(self.primary_check)() {
            info!("not the primary producer; skipping cycle");
            self.listeners
                .fire_cycle_skip(CycleSkipReason::NotPrimaryProducer);
            return Ok(CycleOutcome::Skipped);
        }
        self.cycle_in_flight = true;

        let version = match self.pending_version {
            Some(v) => v,
            None => {
                let v = self.minter.mint();
                self.pending_version = Some(v);
                v
            }
        };
        if self.current.is_none() {
            self.listeners.fire_new_delta_chain(version);
        }
        let cycle_builder = self.listeners.fire_cycle_start(version);
        debug!(version, "cycle started");

        let result = self.execute_stages(version, task);
        match &result {
            Ok(CycleOutcome::NoDelta { version: prior }) => {
                let status = crate::listeners::ProducerStatus {
                    version: *prior,
                    success: true,
                    cause: None,
                };
                self.listeners.fire_cycle_complete(&cycle_builder, &status);
            }
            Ok(_) => {
                self.listeners
                    .fire_cycle_complete(&cycle_builder, &cycle_builder.success());
            }
            Err(e) => {
                warn!(version, error = %e, "cycle failed");
                self.listeners
                    .fire_cycle_complete(&cycle_builder, &cycle_builder.fail(e.to_string()));
            }
        }
        self.cycle_in_flight = false;
        result
    }

    fn execute_stages<F>(&mut self, version: u64, task: F) -> Result<CycleOutcome>
    where
        F: FnOnce(&mut WriteContext<'_>) -> PopulateResult,
    {
        // ── populate ────────────────────────────────────────────────────
        let populate_builder = self.listeners.fire_populate_start(version);
        self.write_engine.prepare_for_write();
        let task_outcome = {
            let mut ctx = WriteContext::new(&mut self.write_engine, version);
            catch_unwind(AssertUnwindSafe(move || task(&mut ctx)))
        };
        self.write_engine.populate_complete();
        let failure = match task_outcome {
            Err(payload) => Some(panic_message(&*payload)),
            Ok(Err(e)) => Some(e.to_string()),
            Ok(Ok(())) => None,
        };
        if let Some(cause) = failure {
            warn!(version, cause = %cause, "populate failed; rolling the write state back");
            self.listeners
                .fire_populate_complete(&populate_builder, &populate_builder.fail(&cause));
            self.write_engine.reset_to_previous();
            return Err(Error::populate(cause));
        }
        self.listeners
            .fire_populate_complete(&populate_builder, &populate_builder.success());

        // ── no-delta detection ──────────────────────────────────────────
        if !self.write_engine.has_changes() {
            info!(version = self.current_version, "population made no changes");
            self.listeners.fire_no_delta(self.current_version);
            return Ok(CycleOutcome::NoDelta {
                version: self.current_version,
            });
        }

        // ── publish ─────────────────────────────────────────────────────
        let publish_builder = self.listeners.fire_publish_start(version);
        let artifacts = match compute_cycle_blobs(
            &self.write_engine,
            self.current.as_deref(),
            self.current_version,
            version,
        ) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                self.listeners
                    .fire_publish_complete(&publish_builder, &publish_builder.fail(e.to_string()));
                return Err(e.into());
            }
        };
        for blob in [&artifacts.snapshot, &artifacts.delta, &artifacts.reverse_delta] {
            if let Err(e) = self.publish_artifact(blob) {
                self.listeners
                    .fire_publish_complete(&publish_builder, &publish_builder.fail(e.to_string()));
                return Err(e);
            }
        }
        self.listeners
            .fire_publish_complete(&publish_builder, &publish_builder.success());

        // ── integrity check ─────────────────────────────────────────────
        let integrity_builder = self.listeners.fire_integrity_check_start(version);
        if let Err(e) = self.verify_integrity(&artifacts) {
            self.listeners.fire_integrity_check_complete(
                &integrity_builder,
                &integrity_builder.fail(e.to_string()),
            );
            return Err(e);
        }
        self.listeners
            .fire_integrity_check_complete(&integrity_builder, &integrity_builder.success());

        // ── validate ────────────────────────────────────────────────────
        let validation_builder = self.listeners.fire_validation_start(version);
        let validation = self.listeners.run_validators(&artifacts.candidate);
        if !validation.is_passed() {
            self.listeners.fire_validation_complete(
                &validation_builder,
                &validation_builder.fail("one or more validations failed"),
                &validation,
            );
            return Err(Error::Validation(validation));
        }
        self.listeners.fire_validation_complete(
            &validation_builder,
            &validation_builder.success(),
            &validation,
        );

        // ── announce ────────────────────────────────────────────────────
        let announcement_builder = self.listeners.fire_announcement_start(version);
        if let Err(e) = self.announcer.announce(version) {
            self.listeners.fire_announcement_complete(
                &announcement_builder,
                &announcement_builder.fail(e.to_string()),
            );
            return Err(Error::announce(e.to_string()));
        }
        self.listeners
            .fire_announcement_complete(&announcement_builder, &announcement_builder.success());

        // ── promote ─────────────────────────────────────────────────────
        self.current = Some(Arc::new(artifacts.candidate));
        self.current_version = version;
        self.pending_version = None;
        self.write_engine.prepare_for_next_cycle();
        info!(version, "cycle announced");
        Ok(CycleOutcome::Announced { version })
    }

    fn publish_artifact(&self, blob: &Blob) -> Result<()> {
        let artifact_builder = StatusBuilder::new(blob.to_version);
        let outcome = self
            .publisher
            .stage(blob)
            .and_then(|handle| self.publisher.publish(&handle));
        let status = PublishStatus {
            kind: blob.kind,
            from_version: blob.from_version,
            to_version: blob.to_version,
            size_bytes: blob.bytes.len(),
            success: outcome.is_ok(),
            cause: outcome.as_ref().err().map(|e| e.to_string()),
        };
        self.listeners
            .fire_artifact_publish(&artifact_builder, &status);
        outcome.map_err(|e| Error::publish(format!("{} artifact: {e}", blob.kind)))
    }

    /// Verify the published artifacts reproduce the canonical state: the
    /// snapshot round-trips, the forward delta lands on the snapshot
    /// state, and the reverse delta walks back to the prior state.
    fn verify_integrity(&self, artifacts: &CycleArtifacts) -> Result<()> {
        let from_snapshot = load_snapshot(&artifacts.snapshot.bytes, Some(&self.schemas))
            .map_err(|e| Error::integrity(e.to_string()))?;
        if !from_snapshot.state_equals(&artifacts.candidate) {
            return Err(Error::integrity(
                "snapshot round-trip diverged from the canonical state",
            ));
        }
        if let Some(prev) = &self.current {
            let forward = apply_delta(prev, &artifacts.delta.bytes)
                .map_err(|e| Error::integrity(e.to_string()))?;
            if !forward.state_equals(&from_snapshot) {
                return Err(Error::integrity(
                    "forward delta application diverged from the snapshot state",
                ));
            }
            let back = apply_delta(&forward, &artifacts.reverse_delta.bytes)
                .map_err(|e| Error::integrity(e.to_string()))?;
            if !back.state_equals(prev) {
                return Err(Error::integrity(
                    "reverse delta application diverged from the prior state",
                ));
            }
        }
        Ok(())
    }

    /// Restore the producer onto an existing delta chain before the first
    /// cycle: load the latest snapshot at or below `target_version`, walk
    /// forward deltas to the target, and seed the write engine so
    /// deduplication and ordinals survive the restart.
    pub fn restore(&mut self, target_version: u64, retriever: &dyn BlobRetriever) -> Result<u64> {
        let builder = self.listeners.fire_restore_start(target_version);
        match self.try_restore(target_version, retriever) {
            Ok(reached) => {
                info!(target_version, reached, "restore complete");
                self.listeners.fire_restore_complete(
                    &builder,
                    &RestoreStatus {
                        success: true,
                        desired_version: target_version,
                        reached_version: reached,
                    },
                );
                Ok(reached)
            }
            Err(e) => {
                warn!(target_version, error = %e, "restore failed; starting a new delta chain");
                self.listeners.fire_restore_complete(
                    &builder,
                    &RestoreStatus {
                        success: false,
                        desired_version: target_version,
                        reached_version: 0,
                    },
                );
                Err(e)
            }
        }
    }

    fn try_restore(&mut self, target_version: u64, retriever: &dyn BlobRetriever) -> Result<u64> {
        if self.current.is_some() {
            return Err(Error::restore("restore must precede the first cycle"));
        }
        let (mut version, bytes) = retriever.retrieve_snapshot(target_version)?;
        let mut state = load_snapshot(&bytes, Some(&self.schemas))?;
        while version < target_version {
            let Some((to_version, delta_bytes)) = retriever.retrieve_delta(version)? else {
                return Err(Error::restore(format!(
                    "delta chain breaks at version {version} before target {target_version}"
                )));
            };
            if to_version > target_version {
                return Err(Error::restore(format!(
                    "delta chain jumps from {version} to {to_version}, past target {target_version}"
                )));
            }
            state = apply_delta(&state, &delta_bytes)?;
            version = to_version;
        }

        for type_state in state.type_states() {
            let name = type_state.name().to_string();
            for ordinal in type_state.populated_ordinals().iter() {
                let row = type_state
                    .decode_row(ordinal)
                    .expect("populated rows decode");
                self.write_engine
                    .restore_insert(&name, ordinal, record_from_row(&row))?;
            }
        }
        self.write_engine.finish_restore()?;
        self.current = Some(Arc::new(state));
        self.current_version = version;
        Ok(version)
    }
}

/// Reconstruct a stageable record from a decoded row.
fn record_from_row(row: &RecordRow) -> WriteRecord {
    match row {
        RecordRow::Object(values) => WriteRecord::Object(values.clone()),
        RecordRow::List(elements) => WriteRecord::List(elements.clone()),
        RecordRow::Set(table) => WriteRecord::Set(table.iter().collect::<Vec<Ordinal>>()),
        RecordRow::Map(table) => {
            WriteRecord::Map(table.iter().collect::<Vec<(Ordinal, Ordinal)>>())
        }
    }
}
