//! The write state engine.
//!
//! One [`TypeWriteState`] per schema, plus the cross-type concerns: record
//! shape checks, reference validation, primary-key projection, and the
//! cycle lifecycle (`prepare_for_write` → adds/removes →
//! `populate_complete` → rollover or rollback).

use crate::error::{Error, Result};
use crate::state::{StoredRecord, TypeWriteState};
use hollow_core::schema::ResolvedKeyPath;
use hollow_core::{
    fnv1a64, FieldType, FieldValue, Ordinal, Schema, SchemaSet, WriteRecord,
};
use std::sync::Arc;
use tracing::debug;

/// Outcome of a dedup probe.
enum Probe {
    /// Identical record already staged.
    Existing(Ordinal),
    /// Keyed record exists with different content.
    Replace(Ordinal),
    /// Nothing matched.
    Fresh,
}

/// Staging area for one dataset's records across all types.
pub struct WriteStateEngine {
    schemas: Arc<SchemaSet>,
    types: Vec<TypeWriteState>,
    /// Resolved primary-key paths, indexed like the schema set.
    pk_paths: Vec<Option<Vec<ResolvedKeyPath>>>,
    sealed: bool,
}

impl WriteStateEngine {
    /// Create an empty engine for the given schema set.
    pub fn new(schemas: Arc<SchemaSet>) -> Result<Self> {
        let mut pk_paths = Vec::with_capacity(schemas.len());
        for schema in schemas.iter() {
            match schema {
                Schema::Object(s) => match &s.primary_key {
                    Some(pk) => {
                        let mut resolved = Vec::with_capacity(pk.field_paths.len());
                        for path in &pk.field_paths {
                            resolved.push(schemas.resolve_path(&s.name, path)?);
                        }
                        pk_paths.push(Some(resolved));
                    }
                    None => pk_paths.push(None),
                },
                _ => pk_paths.push(None),
            }
        }
        let mut types = Vec::with_capacity(schemas.len());
        types.resize_with(schemas.len(), TypeWriteState::default);
        Ok(Self {
            schemas,
            types,
            pk_paths,
            sealed: false,
        })
    }

    /// The dataset's schema set.
    pub fn schemas(&self) -> &Arc<SchemaSet> {
        &self.schemas
    }

    /// True after `populate_complete`, until the next `prepare_for_write`.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// The write-side state of the named type.
    pub fn type_state(&self, type_name: &str) -> Result<&TypeWriteState> {
        let idx = self.type_index(type_name)?;
        Ok(&self.types[idx])
    }

    /// `(schema, state)` pairs in schema order.
    pub fn type_states(&self) -> impl Iterator<Item = (&Schema, &TypeWriteState)> {
        self.schemas.iter().zip(self.types.iter())
    }

    fn type_index(&self, type_name: &str) -> Result<usize> {
        self.schemas
            .position(type_name)
            .ok_or_else(|| hollow_core::Error::unknown_type(type_name).into())
    }

    /// Stage a record, returning its ordinal.
    ///
    /// Types without a primary key dedup on canonical content bytes; keyed
    /// types dedup on the projected key tuple, replacing content in place
    /// when it differs.
    pub fn add(&mut self, type_name: &str, mut record: WriteRecord) -> Result<Ordinal> {
        if self.sealed {
            return Err(Error::sealed(format!(
                "add('{type_name}') after populate_complete"
            )));
        }
        let idx = self.type_index(type_name)?;
        record.canonicalise()?;
        self.check_record(idx, &record)?;
        self.normalise_refs(idx, &mut record);

        let bytes = record.canonical_bytes();
        let content_hash = fnv1a64(&bytes);
        let key_bytes = match &self.pk_paths[idx] {
            Some(paths) => Some(self.project_key(&record, paths)?),
            None => None,
        };

        let probe = self.probe(idx, &bytes, content_hash, key_bytes.as_deref());
        let state = &mut self.types[idx];
        match probe {
            Probe::Existing(ordinal) => {
                state.current.set(ordinal);
                Ok(ordinal)
            }
            Probe::Replace(ordinal) => {
                let old = state.records[ordinal as usize]
                    .replace(StoredRecord {
                        record,
                        content_hash,
                        key_bytes,
                    })
                    .expect("probe resolved to a stored record");
                state.replaced.push((ordinal, old));
                if state.previous.get(ordinal) {
                    state.modified.set(ordinal);
                }
                state.current.set(ordinal);
                Ok(ordinal)
            }
            Probe::Fresh => {
                let ordinal = state.allocate();
                state.store(
                    ordinal,
                    StoredRecord {
                        record,
                        content_hash,
                        key_bytes,
                    },
                );
                state.current.set(ordinal);
                Ok(ordinal)
            }
        }
    }

    /// Unstage the record matching `record`'s identity, if staged this
    /// cycle. Returns the cleared ordinal.
    pub fn remove(&mut self, type_name: &str, mut record: WriteRecord) -> Result<Option<Ordinal>> {
        if self.sealed {
            return Err(Error::sealed(format!(
                "remove('{type_name}') after populate_complete"
            )));
        }
        let idx = self.type_index(type_name)?;
        record.canonicalise()?;
        self.normalise_refs(idx, &mut record);
        let bytes = record.canonical_bytes();
        let content_hash = fnv1a64(&bytes);
        let key_bytes = match &self.pk_paths[idx] {
            Some(paths) => Some(self.project_key(&record, paths)?),
            None => None,
        };
        let found = match self.probe(idx, &bytes, content_hash, key_bytes.as_deref()) {
            Probe::Existing(o) | Probe::Replace(o) => Some(o),
            Probe::Fresh => None,
        };
        if let Some(ordinal) = found {
            self.types[idx].current.clear(ordinal);
            self.types[idx].modified.clear(ordinal);
        }
        Ok(found)
    }

    /// Unstage the keyed record whose primary-key tuple equals
    /// `key_values` (leaf values in key order).
    pub fn remove_by_key(
        &mut self,
        type_name: &str,
        key_values: &[FieldValue],
    ) -> Result<Option<Ordinal>> {
        if self.sealed {
            return Err(Error::sealed(format!(
                "remove_by_key('{type_name}') after populate_complete"
            )));
        }
        let idx = self.type_index(type_name)?;
        if self.pk_paths[idx].is_none() {
            return Err(hollow_core::Error::invalid_record(format!(
                "'{type_name}' has no primary key"
            ))
            .into());
        }
        let key_bytes = Self::key_tuple_bytes(key_values);
        let found = self.find_by_key(idx, &key_bytes);
        if let Some(ordinal) = found {
            self.types[idx].current.clear(ordinal);
            self.types[idx].modified.clear(ordinal);
        }
        Ok(found)
    }

    /// Begin a population pass: re-arm mutation and clear this-cycle sets.
    pub fn prepare_for_write(&mut self) {
        self.sealed = false;
        for state in &mut self.types {
            state.current.clear_all();
            state.modified.clear_all();
            state.replaced.clear();
        }
    }

    /// Seal the engine; `add`/`remove` fail until `prepare_for_write`.
    pub fn populate_complete(&mut self) {
        self.sealed = true;
    }

    /// True when any type's populated set or content changed this cycle.
    pub fn has_changes(&self) -> bool {
        self.types.iter().any(TypeWriteState::has_changes)
    }

    /// Roll over after a successful announce: free unrevived ghosts,
    /// compute the next ghost set, promote `current` to `previous`.
    pub fn prepare_for_next_cycle(&mut self) {
        for (idx, state) in self.types.iter_mut().enumerate() {
            let freed: Vec<Ordinal> = state.ghosts.difference(&state.current).iter().collect();
            for &ordinal in &freed {
                state.evict(ordinal);
            }
            state.freelist.extend(freed.iter().rev());
            if !freed.is_empty() {
                debug!(
                    type_name = %self.schemas.at(idx).name(),
                    freed = freed.len(),
                    "recycled ghost ordinals"
                );
            }
            state.ghosts = state.previous.difference(&state.current);
            state.previous = state.current.clone();
            state.modified.clear_all();
            state.replaced.clear();
        }
    }

    /// Roll back a failed cycle: evict this cycle's fresh ordinals, undo
    /// in-place replacements, restore `current` to the prior populated set.
    pub fn reset_to_previous(&mut self) {
        for state in &mut self.types {
            let keep = state.previous.union(&state.ghosts);
            let fresh: Vec<Ordinal> = state.current.difference(&keep).iter().collect();
            for &ordinal in &fresh {
                state.evict(ordinal);
            }
            state.freelist.extend(fresh.iter().rev());
            while let Some((ordinal, old)) = state.replaced.pop() {
                state.records[ordinal as usize] = Some(old);
            }
            state.current = state.previous.clone();
            state.modified.clear_all();
        }
    }

    /// Place a record at an exact ordinal during restore. Dedup indexes
    /// and key projections are rebuilt by [`finish_restore`].
    ///
    /// [`finish_restore`]: Self::finish_restore
    pub fn restore_insert(
        &mut self,
        type_name: &str,
        ordinal: Ordinal,
        mut record: WriteRecord,
    ) -> Result<()> {
        let idx = self.type_index(type_name)?;
        record.canonicalise()?;
        let bytes = record.canonical_bytes();
        let content_hash = fnv1a64(&bytes);
        let state = &mut self.types[idx];
        if state.records.len() <= ordinal as usize {
            state.records.resize_with(ordinal as usize + 1, || None);
        }
        state.records[ordinal as usize] = Some(StoredRecord {
            record,
            content_hash,
            key_bytes: None,
        });
        state.previous.set(ordinal);
        state.next_ordinal = state.next_ordinal.max(ordinal + 1);
        Ok(())
    }

    /// Finish a restore: project keys, rebuild dedup indexes, and reclaim
    /// ordinal gaps into the freelist.
    pub fn finish_restore(&mut self) -> Result<()> {
        // project keys first; projection reads across type arenas
        let mut projected: Vec<(usize, Ordinal, Vec<u8>)> = Vec::new();
        for (idx, state) in self.types.iter().enumerate() {
            let Some(paths) = &self.pk_paths[idx] else {
                continue;
            };
            for ordinal in state.previous.iter() {
                let record = state.record(ordinal).ok_or_else(|| {
                    hollow_core::Error::invalid_record(format!(
                        "restored ordinal {ordinal} has no record"
                    ))
                })?;
                let key = self.project_key(record, paths)?;
                projected.push((idx, ordinal, key));
            }
        }
        for (idx, ordinal, key) in projected {
            let state = &mut self.types[idx];
            if let Some(stored) = state.records[ordinal as usize].as_mut() {
                stored.key_bytes = Some(key);
            }
        }
        for state in &mut self.types {
            state.by_content.clear();
            state.by_key.clear();
            for ordinal in 0..state.next_ordinal {
                match state.records[ordinal as usize].take() {
                    Some(stored) => state.store(ordinal, stored),
                    None => state.freelist.push(ordinal),
                }
            }
            state.freelist.reverse();
            state.ghosts.clear_all();
            state.current.clear_all();
            state.modified.clear_all();
        }
        Ok(())
    }

    // ── internals ────────────────────────────────────────────────────────

    fn probe(
        &self,
        idx: usize,
        bytes: &[u8],
        content_hash: u64,
        key_bytes: Option<&[u8]>,
    ) -> Probe {
        let state = &self.types[idx];
        match key_bytes {
            Some(key) => match self.find_by_key(idx, key) {
                Some(ordinal) => {
                    let stored = state.stored(ordinal).expect("indexed ordinals are stored");
                    if stored.content_hash == content_hash
                        && stored.record.canonical_bytes() == bytes
                    {
                        Probe::Existing(ordinal)
                    } else {
                        Probe::Replace(ordinal)
                    }
                }
                None => Probe::Fresh,
            },
            None => {
                let Some(chain) = state.by_content.get(&content_hash) else {
                    return Probe::Fresh;
                };
                for &ordinal in chain {
                    let stored = state.stored(ordinal).expect("indexed ordinals are stored");
                    if stored.record.canonical_bytes() == bytes {
                        return Probe::Existing(ordinal);
                    }
                }
                Probe::Fresh
            }
        }
    }

    fn find_by_key(&self, idx: usize, key_bytes: &[u8]) -> Option<Ordinal> {
        let state = &self.types[idx];
        let key_hash = fnv1a64(key_bytes);
        let chain = state.by_key.get(&key_hash)?;
        chain
            .iter()
            .copied()
            .find(|&o| state.stored(o).and_then(|s| s.key_bytes.as_deref()) == Some(key_bytes))
    }

    /// Resolve one leaf value along a key path, chasing references through
    /// the arenas.
    fn project_value(
        &self,
        record: &WriteRecord,
        path: &ResolvedKeyPath,
    ) -> Result<FieldValue> {
        let mut current: WriteRecord = record.clone();
        for (depth, &step) in path.steps.iter().enumerate() {
            let WriteRecord::Object(values) = &current else {
                return Err(hollow_core::Error::invalid_record(format!(
                    "key path traverses non-object record in '{}'",
                    path.types[depth]
                ))
                .into());
            };
            let value = values[step].clone();
            if depth == path.steps.len() - 1 {
                return Ok(value);
            }
            match value {
                FieldValue::Ref(Some(child)) => {
                    let idx = self
                        .schemas
                        .position(&path.types[depth + 1])
                        .expect("validated key path");
                    current = self.types[idx]
                        .record(child)
                        .ok_or_else(|| {
                            Error::dangling(format!(
                                "key path references missing ordinal {child} in '{}'",
                                path.types[depth + 1]
                            ))
                        })?
                        .clone();
                }
                FieldValue::Ref(None) | FieldValue::Null => return Ok(FieldValue::Null),
                _ => {
                    return Err(hollow_core::Error::invalid_record(
                        "key path step is not a reference".to_string(),
                    )
                    .into())
                }
            }
        }
        unreachable!("key paths have at least one step")
    }

    /// Rewrite `Null` on reference fields to the null reference so staged
    /// content matches what a decoded read state produces.
    fn normalise_refs(&self, idx: usize, record: &mut WriteRecord) {
        if let (Schema::Object(s), WriteRecord::Object(values)) = (self.schemas.at(idx), record) {
            for (value, field) in values.iter_mut().zip(s.fields.iter()) {
                if matches!(field.field_type, FieldType::Reference(_))
                    && matches!(value, FieldValue::Null)
                {
                    *value = FieldValue::Ref(None);
                }
            }
        }
    }

    fn project_key(&self, record: &WriteRecord, paths: &[ResolvedKeyPath]) -> Result<Vec<u8>> {
        let mut values = Vec::with_capacity(paths.len());
        for path in paths {
            values.push(self.project_value(record, path)?);
        }
        Ok(Self::key_tuple_bytes(&values))
    }

    fn key_tuple_bytes(values: &[FieldValue]) -> Vec<u8> {
        WriteRecord::Object(values.to_vec()).canonical_bytes()
    }

    /// Validate record shape and that referenced ordinals exist.
    fn check_record(&self, idx: usize, record: &WriteRecord) -> Result<()> {
        match self.schemas.at(idx) {
            Schema::Object(s) => {
                record.check_object(s)?;
                let WriteRecord::Object(values) = record else {
                    unreachable!()
                };
                for (value, field) in values.iter().zip(s.fields.iter()) {
                    if let (FieldValue::Ref(Some(child)), FieldType::Reference(target)) =
                        (value, &field.field_type)
                    {
                        self.check_reference(target, *child, &s.name, &field.name)?;
                    }
                }
                Ok(())
            }
            Schema::List(s) => {
                let WriteRecord::List(elements) = record else {
                    return Err(hollow_core::Error::invalid_record(format!(
                        "'{}' expects a list record",
                        s.name
                    ))
                    .into());
                };
                for &e in elements {
                    self.check_reference(&s.element_type, e, &s.name, "element")?;
                }
                Ok(())
            }
            Schema::Set(s) => {
                let WriteRecord::Set(elements) = record else {
                    return Err(hollow_core::Error::invalid_record(format!(
                        "'{}' expects a set record",
                        s.name
                    ))
                    .into());
                };
                for &e in elements {
                    self.check_reference(&s.element_type, e, &s.name, "element")?;
                }
                Ok(())
            }
            Schema::Map(s) => {
                let WriteRecord::Map(entries) = record else {
                    return Err(hollow_core::Error::invalid_record(format!(
                        "'{}' expects a map record",
                        s.name
                    ))
                    .into());
                };
                for &(k, v) in entries {
                    self.check_reference(&s.key_type, k, &s.name, "key")?;
                    self.check_reference(&s.value_type, v, &s.name, "value")?;
                }
                Ok(())
            }
        }
    }

    fn check_reference(
        &self,
        target: &str,
        ordinal: Ordinal,
        owner: &str,
        role: &str,
    ) -> Result<()> {
        let target_idx = self.type_index(target)?;
        if self.types[target_idx].record(ordinal).is_none() {
            return Err(Error::dangling(format!(
                "'{owner}' {role} references ordinal {ordinal} absent from '{target}'"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hollow_core::{RecordKey, Schema, SchemaField};

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

    fn keyed_schemas() -> Arc<SchemaSet> {
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

    #[test]
    fn content_dedup_returns_same_ordinal() {
        let mut engine = WriteStateEngine::new(movie_schemas()).unwrap();
        let a = engine.add("Movie", movie(1, "A")).unwrap();
        let b = engine.add("Movie", movie(2, "B")).unwrap();
        let a_again = engine.add("Movie", movie(1, "A")).unwrap();
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(engine.type_state("Movie").unwrap().current().cardinality(), 2);
    }

    #[test]
    fn keyed_readd_replaces_in_place() {
        let mut engine = WriteStateEngine::new(keyed_schemas()).unwrap();
        let a = engine.add("Movie", movie(1, "A")).unwrap();
        let a2 = engine.add("Movie", movie(1, "A'")).unwrap();
        assert_eq!(a, a2);
        let state = engine.type_state("Movie").unwrap();
        assert_eq!(
            state.record(a),
            Some(&WriteRecord::Object(vec![
                FieldValue::Int(1),
                FieldValue::Str("A'".into())
            ]))
        );
        // not previously announced, so not a modification
        assert!(state.modified().is_empty());
    }

    #[test]
    fn keyed_ordinal_stable_across_cycles() {
        let mut engine = WriteStateEngine::new(keyed_schemas()).unwrap();
        engine.prepare_for_write();
        let a = engine.add("Movie", movie(1, "A")).unwrap();
        engine.populate_complete();
        engine.prepare_for_next_cycle();

        engine.prepare_for_write();
        let a2 = engine.add("Movie", movie(1, "A changed")).unwrap();
        engine.populate_complete();
        let state = engine.type_state("Movie").unwrap();
        assert_eq!(a, a2);
        assert!(state.modified().get(a));
        assert!(engine.has_changes());
    }

    #[test]
    fn identical_repopulate_has_no_changes() {
        let mut engine = WriteStateEngine::new(movie_schemas()).unwrap();
        engine.prepare_for_write();
        engine.add("Movie", movie(1, "A")).unwrap();
        engine.add("Movie", movie(2, "B")).unwrap();
        engine.populate_complete();
        engine.prepare_for_next_cycle();

        engine.prepare_for_write();
        engine.add("Movie", movie(1, "A")).unwrap();
        engine.add("Movie", movie(2, "B")).unwrap();
        engine.populate_complete();
        assert!(!engine.has_changes());
    }

    #[test]
    fn sealed_engine_rejects_mutation() {
        let mut engine = WriteStateEngine::new(movie_schemas()).unwrap();
        engine.prepare_for_write();
        engine.populate_complete();
        let err = engine.add("Movie", movie(1, "A")).unwrap_err();
        assert!(matches!(err, Error::Sealed(_)));
    }

    #[test]
    fn ghosts_are_recycled_after_two_rollovers() {
        let mut engine = WriteStateEngine::new(movie_schemas()).unwrap();
        engine.prepare_for_write();
        let a = engine.add("Movie", movie(1, "A")).unwrap();
        engine.add("Movie", movie(2, "B")).unwrap();
        engine.populate_complete();
        engine.prepare_for_next_cycle();

        // cycle 2: drop movie 1 -> becomes a ghost, still addressable
        engine.prepare_for_write();
        engine.add("Movie", movie(2, "B")).unwrap();
        engine.populate_complete();
        engine.prepare_for_next_cycle();
        let state = engine.type_state("Movie").unwrap();
        assert!(state.ghosts().get(a));
        assert!(state.record(a).is_some());

        // cycle 3: ghost not revived -> freed at rollover
        engine.prepare_for_write();
        engine.add("Movie", movie(2, "B")).unwrap();
        engine.populate_complete();
        engine.prepare_for_next_cycle();
        let state = engine.type_state("Movie").unwrap();
        assert!(state.record(a).is_none());

        // freed ordinal is reused
        engine.prepare_for_write();
        let c = engine.add("Movie", movie(3, "C")).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn ghost_revival_keeps_ordinal() {
        let mut engine = WriteStateEngine::new(movie_schemas()).unwrap();
        engine.prepare_for_write();
        let a = engine.add("Movie", movie(1, "A")).unwrap();
        engine.populate_complete();
        engine.prepare_for_next_cycle();

        engine.prepare_for_write();
        engine.populate_complete();
        engine.prepare_for_next_cycle();

        engine.prepare_for_write();
        let revived = engine.add("Movie", movie(1, "A")).unwrap();
        assert_eq!(revived, a);
    }

    #[test]
    fn reset_to_previous_rolls_back_fresh_and_replaced() {
        let mut engine = WriteStateEngine::new(keyed_schemas()).unwrap();
        engine.prepare_for_write();
        let a = engine.add("Movie", movie(1, "A")).unwrap();
        engine.populate_complete();
        engine.prepare_for_next_cycle();

        engine.prepare_for_write();
        engine.add("Movie", movie(1, "A replaced")).unwrap();
        let b = engine.add("Movie", movie(2, "B")).unwrap();
        engine.reset_to_previous();

        let state = engine.type_state("Movie").unwrap();
        assert_eq!(state.record(b), None);
        assert_eq!(
            state.record(a),
            Some(&WriteRecord::Object(vec![
                FieldValue::Int(1),
                FieldValue::Str("A".into())
            ]))
        );
        assert_eq!(state.current(), state.previous());
        assert!(state.modified().is_empty());
    }

    #[test]
    fn remove_clears_current_bit() {
        let mut engine = WriteStateEngine::new(movie_schemas()).unwrap();
        engine.prepare_for_write();
        let a = engine.add("Movie", movie(1, "A")).unwrap();
        let removed = engine.remove("Movie", movie(1, "A")).unwrap();
        assert_eq!(removed, Some(a));
        assert!(!engine.type_state("Movie").unwrap().current().get(a));
    }

    #[test]
    fn remove_by_key_resolves_ordinal() {
        let mut engine = WriteStateEngine::new(keyed_schemas()).unwrap();
        engine.prepare_for_write();
        let a = engine.add("Movie", movie(1, "A")).unwrap();
        let removed = engine
            .remove_by_key("Movie", &[FieldValue::Int(1)])
            .unwrap();
        assert_eq!(removed, Some(a));
        assert_eq!(engine.remove_by_key("Movie", &[FieldValue::Int(9)]).unwrap(), None);
    }

    #[test]
    fn dangling_reference_rejected() {
        let schemas = Arc::new(
            SchemaSet::new(vec![
                Schema::object("B", [SchemaField::new("x", FieldType::Int)]),
                Schema::object(
                    "A",
                    [SchemaField::new("b", FieldType::Reference("B".into()))],
                ),
            ])
            .unwrap(),
        );
        let mut engine = WriteStateEngine::new(schemas).unwrap();
        let err = engine
            .add("A", WriteRecord::Object(vec![FieldValue::Ref(Some(7))]))
            .unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)));
    }

    #[test]
    fn restore_rebuilds_dedup_and_freelist() {
        let mut engine = WriteStateEngine::new(movie_schemas()).unwrap();
        engine.restore_insert("Movie", 0, movie(1, "A")).unwrap();
        engine.restore_insert("Movie", 2, movie(3, "C")).unwrap();
        engine.finish_restore().unwrap();

        engine.prepare_for_write();
        // identical content resolves to the restored ordinals
        assert_eq!(engine.add("Movie", movie(1, "A")).unwrap(), 0);
        assert_eq!(engine.add("Movie", movie(3, "C")).unwrap(), 2);
        // the gap at ordinal 1 is reused first
        assert_eq!(engine.add("Movie", movie(2, "B")).unwrap(), 1);
    }
}
