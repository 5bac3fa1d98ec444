//! Full-cycle scenarios: event ordering, no-delta, validator and listener
//! behaviour, publish failure, and restore.

use hollow_producer::{
    CycleOutcome, CycleSkipReason, Error, MemoryAnnouncer, MemoryBlobStore, Producer,
    ProducerListener, ProducerStatus, PublishStatus, Publisher, SequentialVersionMinter,
    ValidationResult, ValidationResultType, ValidationStatus, Validator,
};
use hollow_core::{
    FieldType, FieldValue, RecordKey, Schema, SchemaField, SchemaSet, WriteRecord,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn movie_schemas() -> Arc<SchemaSet> {
    Arc::new(
        SchemaSet::new(vec![Schema::object(
            "Movie",
            [
                SchemaField::new("id", FieldType::Int),
                SchemaField::new("title", FieldType::String),
            ],
        )])
        .unwrap(),
    )
}

fn keyed_movie_schemas() -> Arc<SchemaSet> {
    Arc::new(
        SchemaSet::new(vec![Schema::keyed_object(
            "Movie",
            [
                SchemaField::new("id", FieldType::Int),
                SchemaField::new("title", FieldType::String),
            ],
            RecordKey::new(["id"]),
        )])
        .unwrap(),
    )
}

fn movie(id: i32, title: &str) -> WriteRecord {
    WriteRecord::Object(vec![FieldValue::Int(id), FieldValue::Str(title.into())])
}

/// Records every event it sees, in order.
#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl ProducerListener for EventLog {
    fn on_producer_init(&self, _elapsed_ms: u64) {
        self.push("producer_init");
    }
    fn on_new_delta_chain(&self, version: u64) {
        self.push(format!("new_delta_chain:{version}"));
    }
    fn on_cycle_skip(&self, reason: CycleSkipReason) {
        self.push(format!("cycle_skip:{reason:?}"));
    }
    fn on_cycle_start(&self, version: u64) {
        self.push(format!("cycle_start:{version}"));
    }
    fn on_cycle_complete(&self, status: &ProducerStatus, _elapsed_ms: u64) {
        self.push(format!(
            "cycle_complete:{}:{}",
            if status.success { "ok" } else { "fail" },
            status.version
        ));
    }
    fn on_no_delta_available(&self, version: u64) {
        self.push(format!("no_delta:{version}"));
    }
    fn on_populate_start(&self, version: u64) {
        self.push(format!("populate_start:{version}"));
    }
    fn on_populate_complete(&self, status: &ProducerStatus, _elapsed_ms: u64) {
        self.push(format!(
            "populate_complete:{}",
            if status.success { "ok" } else { "fail" }
        ));
    }
    fn on_publish_start(&self, version: u64) {
        self.push(format!("publish_start:{version}"));
    }
    fn on_artifact_publish(&self, status: &PublishStatus, _elapsed_ms: u64) {
        self.push(format!("artifact_publish:{}", status.kind));
    }
    fn on_publish_complete(&self, status: &ProducerStatus, _elapsed_ms: u64) {
        self.push(format!(
            "publish_complete:{}",
            if status.success { "ok" } else { "fail" }
        ));
    }
    fn on_integrity_check_start(&self, version: u64) {
        self.push(format!("integrity_start:{version}"));
    }
    fn on_integrity_check_complete(&self, status: &ProducerStatus, _elapsed_ms: u64) {
        self.push(format!(
            "integrity_complete:{}",
            if status.success { "ok" } else { "fail" }
        ));
    }
    fn on_validation_start(&self, version: u64) {
        self.push(format!("validation_start:{version}"));
    }
    fn on_validation_complete(&self, status: &ProducerStatus, _elapsed_ms: u64) {
        self.push(format!(
            "validation_complete:{}",
            if status.success { "ok" } else { "fail" }
        ));
    }
    fn on_validation_status_start(&self, version: u64) {
        self.push(format!("validation_status_start:{version}"));
    }
    fn on_validation_status_complete(
        &self,
        status: &ValidationStatus,
        _version: u64,
        _elapsed_ms: u64,
    ) {
        self.push(format!(
            "validation_status_complete:{}",
            if status.is_passed() { "passed" } else { "failed" }
        ));
    }
    fn on_announcement_start(&self, version: u64) {
        self.push(format!("announcement_start:{version}"));
    }
    fn on_announcement_complete(&self, status: &ProducerStatus, _elapsed_ms: u64) {
        self.push(format!(
            "announcement_complete:{}",
            if status.success { "ok" } else { "fail" }
        ));
    }
}

fn sequential_producer(
    schemas: Arc<SchemaSet>,
    store: Arc<MemoryBlobStore>,
    announcer: Arc<MemoryAnnouncer>,
    log: Arc<EventLog>,
) -> Producer {
    Producer::builder(schemas)
        .with_publisher(store)
        .with_announcer(announcer)
        .with_version_minter(Arc::new(SequentialVersionMinter::new()))
        .with_listener(log)
        .build()
        .unwrap()
}

#[test]
fn minimal_cycle_fires_the_full_event_sequence() {
    let store = Arc::new(MemoryBlobStore::new());
    let announcer = Arc::new(MemoryAnnouncer::new());
    let log = Arc::new(EventLog::default());
    let mut producer =
        sequential_producer(movie_schemas(), store.clone(), announcer.clone(), log.clone());

    let outcome = producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            ctx.add("Movie", movie(2, "B"))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(outcome, CycleOutcome::Announced { version: 1 });
    assert_eq!(announcer.announced_version(), Some(1));
    assert_eq!(store.published_count(), 3);

    let state = producer.read_state().unwrap();
    let populated = state.type_state("Movie").unwrap().populated_ordinals();
    assert_eq!(populated.iter().collect::<Vec<_>>(), vec![0, 1]);

    assert_eq!(
        log.events(),
        vec![
            "producer_init",
            "new_delta_chain:1",
            "cycle_start:1",
            "populate_start:1",
            "populate_complete:ok",
            "publish_start:1",
            "artifact_publish:snapshot",
            "artifact_publish:delta",
            "artifact_publish:reverse-delta",
            "publish_complete:ok",
            "integrity_start:1",
            "integrity_complete:ok",
            "validation_start:1",
            "validation_status_start:1",
            "validation_complete:ok",
            "validation_status_complete:passed",
            "announcement_start:1",
            "announcement_complete:ok",
            "cycle_complete:ok:1",
        ]
    );
}

#[test]
fn add_then_remove_shrinks_the_populated_set() {
    let store = Arc::new(MemoryBlobStore::new());
    let announcer = Arc::new(MemoryAnnouncer::new());
    let log = Arc::new(EventLog::default());
    let mut producer =
        sequential_producer(movie_schemas(), store.clone(), announcer.clone(), log);

    producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            ctx.add("Movie", movie(2, "B"))?;
            Ok(())
        })
        .unwrap();

    let outcome = producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(2, "B"))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(outcome, CycleOutcome::Announced { version: 2 });
    let state = producer.read_state().unwrap();
    let populated = state.type_state("Movie").unwrap().populated_ordinals();
    // the id=2 record keeps ordinal 1; ordinal 0 is removed
    assert_eq!(populated.iter().collect::<Vec<_>>(), vec![1]);

    // the store carries a delta departing version 1
    use hollow_producer::BlobRetriever;
    assert_eq!(store.retrieve_delta(1).unwrap().unwrap().0, 2);
    assert_eq!(store.retrieve_reverse_delta(2).unwrap().unwrap().0, 1);
}

#[test]
fn identical_population_yields_no_delta() {
    let store = Arc::new(MemoryBlobStore::new());
    let announcer = Arc::new(MemoryAnnouncer::new());
    let log = Arc::new(EventLog::default());
    let mut producer =
        sequential_producer(movie_schemas(), store.clone(), announcer.clone(), log.clone());

    producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            Ok(())
        })
        .unwrap();
    let published_before = store.published_count();

    let outcome = producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(outcome, CycleOutcome::NoDelta { version: 1 });
    assert_eq!(store.published_count(), published_before);
    assert_eq!(announcer.announced_version(), Some(1));
    let events = log.events();
    assert!(events.contains(&"no_delta:1".to_string()));
    assert!(events.contains(&"cycle_complete:ok:1".to_string()));
}

struct NamedValidator {
    name: &'static str,
    result: fn(&str) -> ValidationResult,
}

impl Validator for NamedValidator {
    fn name(&self) -> String {
        self.name.to_string()
    }
    fn validate(&self, _state: &hollow_read::ReadStateEngine) -> ValidationResult {
        (self.result)(self.name)
    }
}

#[test]
fn failing_validator_fails_the_cycle_and_keeps_prior_state() {
    let announcer = Arc::new(MemoryAnnouncer::new());
    let log = Arc::new(EventLog::default());
    let mut producer = Producer::builder(movie_schemas())
        .with_announcer(announcer.clone())
        .with_version_minter(Arc::new(SequentialVersionMinter::new()))
        .with_listener(log.clone())
        .with_validator(Arc::new(NamedValidator {
            name: "first",
            result: |n| ValidationResult::passed(n),
        }))
        .with_validator(Arc::new(NamedValidator {
            name: "second",
            result: |n| ValidationResult::failed(n, "bad"),
        }))
        .build()
        .unwrap();

    let err = producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            Ok(())
        })
        .unwrap_err();

    let Error::Validation(status) = err else {
        panic!("expected a validation failure");
    };
    assert!(!status.is_passed());
    let types: Vec<ValidationResultType> =
        status.results().iter().map(|r| r.result_type).collect();
    assert_eq!(
        types,
        vec![ValidationResultType::Passed, ValidationResultType::Failed]
    );

    // never announced, nothing promoted
    assert_eq!(announcer.announced_version(), None);
    assert!(producer.read_state().is_none());
    let events = log.events();
    assert!(events.contains(&"validation_status_complete:failed".to_string()));
    assert!(events.contains(&"cycle_complete:fail:1".to_string()));
    assert!(!events.iter().any(|e| e.starts_with("announcement_start")));
}

#[test]
fn panicking_validator_is_recorded_as_error() {
    struct Exploder;
    impl Validator for Exploder {
        fn name(&self) -> String {
            "exploder".to_string()
        }
        fn validate(&self, _state: &hollow_read::ReadStateEngine) -> ValidationResult {
            panic!("validator blew up");
        }
    }

    let mut producer = Producer::builder(movie_schemas())
        .with_version_minter(Arc::new(SequentialVersionMinter::new()))
        .with_validator(Arc::new(Exploder))
        .build()
        .unwrap();

    let err = producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            Ok(())
        })
        .unwrap_err();

    let Error::Validation(status) = err else {
        panic!("expected a validation failure");
    };
    let result = &status.results()[0];
    assert_eq!(result.result_type, ValidationResultType::Error);
    assert_eq!(result.message.as_deref(), Some("validator blew up"));
}

#[test]
fn panicking_listener_is_isolated_and_keeps_receiving() {
    struct PanicOnCycleStart {
        log: Arc<EventLog>,
    }
    impl ProducerListener for PanicOnCycleStart {
        fn on_cycle_start(&self, version: u64) {
            self.log.push(format!("panicker_saw_cycle_start:{version}"));
            panic!("listener failure");
        }
        fn on_cycle_complete(&self, _status: &ProducerStatus, _elapsed_ms: u64) {
            self.log.push("panicker_saw_cycle_complete");
        }
    }

    let log = Arc::new(EventLog::default());
    let panicker = Arc::new(PanicOnCycleStart { log: log.clone() });
    let healthy = Arc::new(EventLog::default());
    let mut producer = Producer::builder(movie_schemas())
        .with_version_minter(Arc::new(SequentialVersionMinter::new()))
        .with_listener(panicker)
        .with_listener(healthy.clone())
        .build()
        .unwrap();

    producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            Ok(())
        })
        .unwrap();

    // the healthy listener still observed cycle start and completion
    let healthy_events = healthy.events();
    assert!(healthy_events.contains(&"cycle_start:1".to_string()));
    assert!(healthy_events.contains(&"cycle_complete:ok:1".to_string()));

    // the panicking listener received both of its events
    let panicked_events = log.events();
    assert!(panicked_events.contains(&"panicker_saw_cycle_start:1".to_string()));
    assert!(panicked_events.contains(&"panicker_saw_cycle_complete".to_string()));

    // a second cycle still reaches it
    producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(2, "B"))?;
            Ok(())
        })
        .unwrap();
    assert!(log
        .events()
        .contains(&"panicker_saw_cycle_start:2".to_string()));
}

#[test]
fn populate_failure_rolls_back_and_reuses_the_version() {
    let announcer = Arc::new(MemoryAnnouncer::new());
    let log = Arc::new(EventLog::default());
    let mut producer = Producer::builder(movie_schemas())
        .with_announcer(announcer.clone())
        .with_version_minter(Arc::new(SequentialVersionMinter::new()))
        .with_listener(log.clone())
        .build()
        .unwrap();

    let err = producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            Err("source unavailable".into())
        })
        .unwrap_err();
    assert!(matches!(err, Error::Populate(_)));
    assert!(log.events().contains(&"cycle_complete:fail:1".to_string()));

    // the failed cycle did not consume version 1
    let outcome = producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            Ok(())
        })
        .unwrap();
    assert_eq!(outcome, CycleOutcome::Announced { version: 1 });
    assert_eq!(announcer.announced_version(), Some(1));
}

#[test]
fn panicking_populate_task_fails_the_cycle() {
    let mut producer = Producer::builder(movie_schemas())
        .with_version_minter(Arc::new(SequentialVersionMinter::new()))
        .build()
        .unwrap();

    let err = producer
        .run_cycle(|_ctx| -> hollow_producer::PopulateResult {
            panic!("task exploded");
        })
        .unwrap_err();
    let Error::Populate(cause) = err else {
        panic!("expected a populate failure");
    };
    assert_eq!(cause, "task exploded");
}

#[test]
fn non_primary_producer_skips_without_touching_state() {
    let log = Arc::new(EventLog::default());
    let mut producer = Producer::builder(movie_schemas())
        .with_version_minter(Arc::new(SequentialVersionMinter::new()))
        .with_primary_producer_check(|| false)
        .with_listener(log.clone())
        .build()
        .unwrap();

    let outcome = producer.run_cycle(|_ctx| Ok(())).unwrap();
    assert_eq!(outcome, CycleOutcome::Skipped);
    assert!(producer.read_state().is_none());
    assert_eq!(
        log.events(),
        vec!["producer_init", "cycle_skip:NotPrimaryProducer"]
    );
}

/// Fails the first `failures` publish attempts, then delegates.
struct FlakyPublisher {
    inner: Arc<MemoryBlobStore>,
    remaining_failures: AtomicUsize,
}

impl Publisher for FlakyPublisher {
    fn stage(&self, blob: &hollow_blob::Blob) -> hollow_producer::Result<hollow_producer::BlobHandle> {
        if self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(hollow_producer::Error::publish("store offline"));
        }
        self.inner.stage(blob)
    }

    fn publish(&self, handle: &hollow_producer::BlobHandle) -> hollow_producer::Result<()> {
        self.inner.publish(handle)
    }
}

#[test]
fn publish_failure_retains_prior_state_for_the_next_cycle() {
    let store = Arc::new(MemoryBlobStore::new());
    let announcer = Arc::new(MemoryAnnouncer::new());
    let publisher = Arc::new(FlakyPublisher {
        inner: store.clone(),
        remaining_failures: AtomicUsize::new(0),
    });
    let mut producer = Producer::builder(movie_schemas())
        .with_publisher(publisher.clone())
        .with_announcer(announcer.clone())
        .with_version_minter(Arc::new(SequentialVersionMinter::new()))
        .build()
        .unwrap();

    producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            Ok(())
        })
        .unwrap();

    // second cycle hits the outage
    publisher.remaining_failures.store(1, Ordering::SeqCst);
    let err = producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(2, "B"))?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, Error::Publish(_)));
    assert_eq!(announcer.announced_version(), Some(1));
    let populated: Vec<_> = producer
        .read_state()
        .unwrap()
        .type_state("Movie")
        .unwrap()
        .populated_ordinals()
        .iter()
        .collect();
    assert_eq!(populated, vec![0]);

    // the retry computes its delta against the retained prior state
    let outcome = producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(2, "B"))?;
            Ok(())
        })
        .unwrap();
    assert_eq!(outcome, CycleOutcome::Announced { version: 2 });
    use hollow_producer::BlobRetriever;
    assert_eq!(store.retrieve_delta(1).unwrap().unwrap().0, 2);
}

#[test]
fn restore_resumes_the_delta_chain_with_stable_ordinals() {
    let store = Arc::new(MemoryBlobStore::new());
    let announcer = Arc::new(MemoryAnnouncer::new());
    let log = Arc::new(EventLog::default());
    let schemas = keyed_movie_schemas();
    let mut producer = sequential_producer(schemas.clone(), store.clone(), announcer.clone(), log);

    producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            ctx.add("Movie", movie(2, "B"))?;
            Ok(())
        })
        .unwrap();
    producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            ctx.add("Movie", movie(2, "B v2"))?;
            Ok(())
        })
        .unwrap();
    drop(producer);

    // a fresh producer restores from the published blobs
    let announcer2 = Arc::new(MemoryAnnouncer::new());
    let mut restored = Producer::builder(schemas)
        .with_publisher(store.clone())
        .with_announcer(announcer2.clone())
        .with_version_minter(Arc::new(SequentialVersionMinter::starting_at(3)))
        .build()
        .unwrap();
    let reached = restored.restore(2, store.as_ref()).unwrap();
    assert_eq!(reached, 2);
    assert_eq!(restored.current_version(), 2);

    // identical repopulation is a no-delta cycle
    let outcome = restored
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            ctx.add("Movie", movie(2, "B v2"))?;
            Ok(())
        })
        .unwrap();
    assert_eq!(outcome, CycleOutcome::NoDelta { version: 2 });

    // a keyed change keeps its pre-restart ordinal
    let outcome = restored
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            ctx.add("Movie", movie(2, "B v3"))?;
            Ok(())
        })
        .unwrap();
    assert_eq!(outcome, CycleOutcome::Announced { version: 3 });
    let state = restored.read_state().unwrap();
    let movie_state = state.type_state("Movie").unwrap().as_object().unwrap();
    assert_eq!(
        movie_state.read_field(1, 1),
        Some(FieldValue::Str("B v3".into()))
    );
    use hollow_producer::BlobRetriever;
    assert_eq!(store.retrieve_delta(2).unwrap().unwrap().0, 3);
}

/// Serves snapshots only up to a cap, forcing restore to walk deltas.
struct CappedSnapshotRetriever {
    inner: Arc<MemoryBlobStore>,
    snapshot_cap: u64,
}

impl hollow_producer::BlobRetriever for CappedSnapshotRetriever {
    fn retrieve_snapshot(&self, version: u64) -> hollow_producer::Result<(u64, Vec<u8>)> {
        self.inner.retrieve_snapshot(version.min(self.snapshot_cap))
    }
    fn retrieve_delta(&self, from_version: u64) -> hollow_producer::Result<Option<(u64, Vec<u8>)>> {
        self.inner.retrieve_delta(from_version)
    }
    fn retrieve_reverse_delta(
        &self,
        from_version: u64,
    ) -> hollow_producer::Result<Option<(u64, Vec<u8>)>> {
        self.inner.retrieve_reverse_delta(from_version)
    }
}

#[test]
fn restore_walks_forward_deltas_to_the_target() {
    let store = Arc::new(MemoryBlobStore::new());
    let announcer = Arc::new(MemoryAnnouncer::new());
    let log = Arc::new(EventLog::default());
    let schemas = movie_schemas();
    let mut producer = sequential_producer(schemas.clone(), store.clone(), announcer, log);

    producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            Ok(())
        })
        .unwrap();
    producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(1, "A"))?;
            ctx.add("Movie", movie(2, "B"))?;
            Ok(())
        })
        .unwrap();
    producer
        .run_cycle(|ctx| {
            ctx.add("Movie", movie(2, "B"))?;
            Ok(())
        })
        .unwrap();
    drop(producer);

    let retriever = CappedSnapshotRetriever {
        inner: store.clone(),
        snapshot_cap: 1,
    };
    let mut restored = Producer::builder(schemas)
        .with_publisher(store)
        .with_version_minter(Arc::new(SequentialVersionMinter::starting_at(4)))
        .build()
        .unwrap();
    let reached = restored.restore(3, &retriever).unwrap();
    assert_eq!(reached, 3);

    let state = restored.read_state().unwrap();
    let populated: Vec<_> = state
        .type_state("Movie")
        .unwrap()
        .populated_ordinals()
        .iter()
        .collect();
    assert_eq!(populated, vec![1]);
}
