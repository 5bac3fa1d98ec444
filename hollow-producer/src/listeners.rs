//! The listener fabric.
//!
//! One [`ProducerListener`] trait covers every stage role with default
//! no-op methods; an instance opts into any subset by overriding. The
//! registration set is copy-on-write: dispatch snapshots the vector, so
//! add/remove never race a running cycle. A listener that panics is
//! logged and isolated; the remaining listeners still receive the event,
//! and the panicking listener stays registered for future events.

use crate::validation::{ValidationResult, ValidationStatus, Validator};
use hollow_blob::BlobKind;
use hollow_read::ReadStateEngine;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Why a cycle was skipped without touching state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleSkipReason {
    /// This producer is not the primary producer for the dataset.
    NotPrimaryProducer,
}

/// Terminal status of a stage or cycle.
#[derive(Clone, Debug)]
pub struct ProducerStatus {
    pub version: u64,
    pub success: bool,
    pub cause: Option<String>,
}

/// Captures a stage's start instant; completion reports elapsed millis.
pub struct StatusBuilder {
    version: u64,
    start: Instant,
}

impl StatusBuilder {
    pub(crate) fn new(version: u64) -> Self {
        Self {
            version,
            start: Instant::now(),
        }
    }

    /// Elapsed milliseconds since the stage started.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub(crate) fn success(&self) -> ProducerStatus {
        ProducerStatus {
            version: self.version,
            success: true,
            cause: None,
        }
    }

    pub(crate) fn fail(&self, cause: impl Into<String>) -> ProducerStatus {
        ProducerStatus {
            version: self.version,
            success: false,
            cause: Some(cause.into()),
        }
    }
}

/// Status of one staged artifact.
#[derive(Clone, Debug)]
pub struct PublishStatus {
    pub kind: BlobKind,
    pub from_version: u64,
    pub to_version: u64,
    pub size_bytes: usize,
    pub success: bool,
    pub cause: Option<String>,
}

/// Outcome of a restore attempt.
#[derive(Clone, Debug)]
pub struct RestoreStatus {
    pub success: bool,
    pub desired_version: u64,
    pub reached_version: u64,
}

/// A subscriber to producer stage events. Every method is a no-op by
/// default; implement the roles of interest.
#[allow(unused_variables)]
pub trait ProducerListener: Send + Sync {
    fn on_producer_init(&self, elapsed_ms: u64) {}

    fn on_producer_restore_start(&self, version: u64) {}
    fn on_producer_restore_complete(&self, status: &RestoreStatus, elapsed_ms: u64) {}

    fn on_new_delta_chain(&self, version: u64) {}

    fn on_cycle_skip(&self, reason: CycleSkipReason) {}
    fn on_cycle_start(&self, version: u64) {}
    fn on_cycle_complete(&self, status: &ProducerStatus, elapsed_ms: u64) {}
    fn on_no_delta_available(&self, version: u64) {}

    fn on_populate_start(&self, version: u64) {}
    fn on_populate_complete(&self, status: &ProducerStatus, elapsed_ms: u64) {}

    fn on_publish_start(&self, version: u64) {}
    fn on_artifact_publish(&self, status: &PublishStatus, elapsed_ms: u64) {}
    fn on_publish_complete(&self, status: &ProducerStatus, elapsed_ms: u64) {}

    fn on_integrity_check_start(&self, version: u64) {}
    fn on_integrity_check_complete(&self, status: &ProducerStatus, elapsed_ms: u64) {}

    fn on_validation_start(&self, version: u64) {}
    fn on_validation_complete(&self, status: &ProducerStatus, elapsed_ms: u64) {}
    fn on_validation_status_start(&self, version: u64) {}
    fn on_validation_status_complete(
        &self,
        status: &ValidationStatus,
        version: u64,
        elapsed_ms: u64,
    ) {
    }

    fn on_announcement_start(&self, version: u64) {}
    fn on_announcement_complete(&self, status: &ProducerStatus, elapsed_ms: u64) {}
}

/// Registration set and panic-isolated dispatch.
pub(crate) struct ListenerSupport {
    listeners: RwLock<Vec<Arc<dyn ProducerListener>>>,
    validators: RwLock<Vec<Arc<dyn Validator>>>,
}

impl ListenerSupport {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            validators: RwLock::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ProducerListener>) {
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ProducerListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn add_validator(&self, validator: Arc<dyn Validator>) {
        let mut validators = self.validators.write();
        if !validators.iter().any(|v| Arc::ptr_eq(v, &validator)) {
            validators.push(validator);
        }
    }

    /// Dispatch one event to every listener, isolating panics.
    pub fn fire(&self, f: impl Fn(&dyn ProducerListener)) {
        let snapshot = self.listeners.read().clone();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))).is_err() {
                warn!("listener panicked during dispatch; isolating");
            }
        }
    }

    // ── stage event helpers ─────────────────────────────────────────────

    pub fn fire_producer_init(&self, elapsed_ms: u64) {
        self.fire(|l| l.on_producer_init(elapsed_ms));
    }

    pub fn fire_restore_start(&self, version: u64) -> StatusBuilder {
        self.fire(|l| l.on_producer_restore_start(version));
        StatusBuilder::new(version)
    }

    pub fn fire_restore_complete(&self, builder: &StatusBuilder, status: &RestoreStatus) {
        self.fire(|l| l.on_producer_restore_complete(status, builder.elapsed_ms()));
    }

    pub fn fire_new_delta_chain(&self, version: u64) {
        self.fire(|l| l.on_new_delta_chain(version));
    }

    pub fn fire_cycle_skip(&self, reason: CycleSkipReason) {
        self.fire(|l| l.on_cycle_skip(reason));
    }

    pub fn fire_cycle_start(&self, version: u64) -> StatusBuilder {
        self.fire(|l| l.on_cycle_start(version));
        StatusBuilder::new(version)
    }

    pub fn fire_cycle_complete(&self, builder: &StatusBuilder, status: &ProducerStatus) {
        self.fire(|l| l.on_cycle_complete(status, builder.elapsed_ms()));
    }

    pub fn fire_no_delta(&self, version: u64) {
        self.fire(|l| l.on_no_delta_available(version));
    }

    pub fn fire_populate_start(&self, version: u64) -> StatusBuilder {
        self.fire(|l| l.on_populate_start(version));
        StatusBuilder::new(version)
    }

    pub fn fire_populate_complete(&self, builder: &StatusBuilder, status: &ProducerStatus) {
        self.fire(|l| l.on_populate_complete(status, builder.elapsed_ms()));
    }

    pub fn fire_publish_start(&self, version: u64) -> StatusBuilder {
        self.fire(|l| l.on_publish_start(version));
        StatusBuilder::new(version)
    }

    pub fn fire_artifact_publish(&self, builder: &StatusBuilder, status: &PublishStatus) {
        self.fire(|l| l.on_artifact_publish(status, builder.elapsed_ms()));
    }

    pub fn fire_publish_complete(&self, builder: &StatusBuilder, status: &ProducerStatus) {
        self.fire(|l| l.on_publish_complete(status, builder.elapsed_ms()));
    }

    pub fn fire_integrity_check_start(&self, version: u64) -> StatusBuilder {
        self.fire(|l| l.on_integrity_check_start(version));
        StatusBuilder::new(version)
    }

    pub fn fire_integrity_check_complete(&self, builder: &StatusBuilder, status: &ProducerStatus) {
        self.fire(|l| l.on_integrity_check_complete(status, builder.elapsed_ms()));
    }

    pub fn fire_validation_start(&self, version: u64) -> StatusBuilder {
        self.fire(|l| l.on_validation_start(version));
        self.fire(|l| l.on_validation_status_start(version));
        StatusBuilder::new(version)
    }

    pub fn fire_validation_complete(
        &self,
        builder: &StatusBuilder,
        status: &ProducerStatus,
        validation: &ValidationStatus,
    ) {
        self.fire(|l| l.on_validation_complete(status, builder.elapsed_ms()));
        self.fire(|l| {
            l.on_validation_status_complete(validation, status.version, builder.elapsed_ms())
        });
    }

    pub fn fire_announcement_start(&self, version: u64) -> StatusBuilder {
        self.fire(|l| l.on_announcement_start(version));
        StatusBuilder::new(version)
    }

    pub fn fire_announcement_complete(&self, builder: &StatusBuilder, status: &ProducerStatus) {
        self.fire(|l| l.on_announcement_complete(status, builder.elapsed_ms()));
    }

    /// Run every registered validator against the candidate state,
    /// capturing panics as `Error` results.
    pub fn run_validators(&self, read_state: &ReadStateEngine) -> ValidationStatus {
        let snapshot = self.validators.read().clone();
        let mut results = Vec::with_capacity(snapshot.len());
        for validator in snapshot {
            let name = validator.name();
            match catch_unwind(AssertUnwindSafe(|| validator.validate(read_state))) {
                Ok(result) => results.push(result),
                Err(payload) => {
                    let cause = panic_message(&*payload);
                    warn!(validator = %name, cause = %cause, "validator panicked");
                    results.push(ValidationResult::error(name, cause));
                }
            }
        }
        ValidationStatus::new(results)
    }
}

/// Best-effort panic payload rendering.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
