//! Field-match scans.
//!
//! `find_matching_records(name, text)` scans every object type for fields
//! named `name`, parses `text` into each field's native type (a parse
//! failure simply yields no match for that field), and collects the
//! ordinals whose decoded value equals the query value.
//!
//! A reference field whose target is a single-field object schema is
//! chased: the scan recurses into the referenced type and projects the
//! matches back through the reference, so a record matches when its
//! single-field reference chain reaches a matching leaf. Chains of
//! single-field reference types recurse without bound.
//!
//! The parallel variant partitions each type's ordinal space into
//! 256-ordinal chunks claimed from a single atomic cursor by the shared
//! [`ScanPool`] workers.

use crate::pool::ScanPool;
use hollow_core::{
    AtomicOrdinalBitSet, FieldType, FieldValue, Ordinal, OrdinalBitSet,
};
use hollow_read::{ObjectReadState, ReadStateEngine};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Ordinals claimed per cursor fetch.
const SCAN_CHUNK: u32 = 256;

/// Schema-aware equality scans over a read state engine.
pub struct FieldMatchQuery {
    engine: Arc<ReadStateEngine>,
}

impl FieldMatchQuery {
    pub fn new(engine: Arc<ReadStateEngine>) -> Self {
        Self { engine }
    }

    /// Scan every object type sequentially.
    pub fn find_matching_records(
        &self,
        field_name: &str,
        field_value: &str,
    ) -> FxHashMap<String, OrdinalBitSet> {
        self.find(field_name, field_value, None)
    }

    /// Scan every object type using the shared worker pool.
    pub fn find_matching_records_parallel(
        &self,
        field_name: &str,
        field_value: &str,
        pool: &ScanPool,
    ) -> FxHashMap<String, OrdinalBitSet> {
        self.find(field_name, field_value, Some(pool))
    }

    fn find(
        &self,
        field_name: &str,
        field_value: &str,
        pool: Option<&ScanPool>,
    ) -> FxHashMap<String, OrdinalBitSet> {
        let mut matches = FxHashMap::default();
        for type_state in self.engine.type_states() {
            let Some(object) = type_state.as_object() else {
                continue;
            };
            let schema = object.schema();
            for (field_idx, field) in schema.fields.iter().enumerate() {
                let found = match &field.field_type {
                    FieldType::Reference(target) => self.reference_traversal(
                        object,
                        field_idx,
                        target,
                        field_name,
                        field_value,
                        field.name == field_name,
                        pool,
                    ),
                    scalar if field.name == field_name => parse_query_value(scalar, field_value)
                        .map(|qv| self.scan_values(object, field_idx, qv, pool)),
                    _ => None,
                };
                if let Some(found) = found {
                    if found.cardinality() > 0 {
                        matches.insert(schema.name.clone(), found);
                    }
                }
            }
        }
        debug!(
            field = field_name,
            types = matches.len(),
            "field-match query complete"
        );
        matches
    }

    /// Chase a reference field whose target is a single-field object
    /// schema, projecting the nested matches back through the reference.
    ///
    /// The chase fires when the reference field's own name matched the
    /// query (`name_matched`), or when the chain's leaf field carries the
    /// queried name. Chains of single-field reference types recurse
    /// without bound.
    #[allow(clippy::too_many_arguments)]
    fn reference_traversal(
        &self,
        object: &ObjectReadState,
        field_idx: usize,
        target: &str,
        field_name: &str,
        field_value: &str,
        name_matched: bool,
        pool: Option<&ScanPool>,
    ) -> Option<OrdinalBitSet> {
        let ref_object = self.engine.type_state(target)?.as_object()?;
        let ref_schema = ref_object.schema();
        if ref_schema.fields.len() != 1 {
            return None;
        }
        let leaf = &ref_schema.fields[0];
        match &leaf.field_type {
            FieldType::Reference(next) => {
                let ref_matches = self.reference_traversal(
                    ref_object,
                    0,
                    next,
                    field_name,
                    field_value,
                    name_matched || leaf.name == field_name,
                    pool,
                )?;
                Some(self.scan_references(object, field_idx, ref_matches, pool))
            }
            scalar => {
                if !name_matched && leaf.name != field_name {
                    return None;
                }
                let qv = parse_query_value(scalar, field_value)?;
                let ref_matches = self.scan_values(ref_object, 0, qv, pool);
                (ref_matches.cardinality() > 0)
                    .then(|| self.scan_references(object, field_idx, ref_matches, pool))
            }
        }
    }

    fn scan_values(
        &self,
        object: &ObjectReadState,
        field_idx: usize,
        query_value: FieldValue,
        pool: Option<&ScanPool>,
    ) -> OrdinalBitSet {
        match pool {
            None => {
                let mut result = OrdinalBitSet::new();
                for ordinal in object.populated_ordinals().iter() {
                    if object.read_field(ordinal, field_idx).as_ref() == Some(&query_value) {
                        result.set(ordinal);
                    }
                }
                result
            }
            Some(pool) => self.parallel_scan(
                &object.schema().name,
                pool,
                Arc::new(move |object: &ObjectReadState, ordinal: Ordinal| {
                    object.read_field(ordinal, field_idx).as_ref() == Some(&query_value)
                }),
            ),
        }
    }

    fn scan_references(
        &self,
        object: &ObjectReadState,
        field_idx: usize,
        ref_matches: OrdinalBitSet,
        pool: Option<&ScanPool>,
    ) -> OrdinalBitSet {
        match pool {
            None => {
                let mut result = OrdinalBitSet::new();
                for ordinal in object.populated_ordinals().iter() {
                    if object
                        .read_reference(ordinal, field_idx)
                        .is_some_and(|child| ref_matches.get(child))
                    {
                        result.set(ordinal);
                    }
                }
                result
            }
            Some(pool) => self.parallel_scan(
                &object.schema().name,
                pool,
                Arc::new(move |object: &ObjectReadState, ordinal: Ordinal| {
                    object
                        .read_reference(ordinal, field_idx)
                        .is_some_and(|child| ref_matches.get(child))
                }),
            ),
        }
    }

    /// Work-stealing scan: workers claim 256-ordinal chunks from one
    /// shared cursor and set matches in a concurrent bitset.
    fn parallel_scan(
        &self,
        type_name: &str,
        pool: &ScanPool,
        predicate: Arc<dyn Fn(&ObjectReadState, Ordinal) -> bool + Send + Sync>,
    ) -> OrdinalBitSet {
        let len = self
            .engine
            .type_state(type_name)
            .and_then(|s| s.populated_ordinals().max_set_bit())
            .map_or(0, |m| m + 1);
        if len == 0 {
            return OrdinalBitSet::new();
        }
        let engine = self.engine.clone();
        let type_name = type_name.to_string();
        let cursor = Arc::new(AtomicU32::new(0));
        let result = Arc::new(AtomicOrdinalBitSet::with_capacity(len as usize));
        let task_result = result.clone();
        pool.broadcast(Arc::new(move || {
            let Some(object) = engine.type_state(&type_name).and_then(|s| s.as_object()) else {
                return;
            };
            let populated = object.populated_ordinals();
            loop {
                let start = cursor.fetch_add(SCAN_CHUNK, Ordering::Relaxed);
                if start >= len {
                    break;
                }
                let chunk_end = start.saturating_add(SCAN_CHUNK).min(len);
                let mut next = populated.next_set_bit(start);
                while let Some(ordinal) = next {
                    if ordinal >= chunk_end {
                        break;
                    }
                    if predicate(object, ordinal) {
                        task_result.set(ordinal);
                    }
                    next = populated.next_set_bit(ordinal + 1);
                }
            }
        }));
        result.to_bitset()
    }
}

/// Parse the query text into the field's native type; `None` means the
/// field can never match.
fn parse_query_value(field_type: &FieldType, text: &str) -> Option<FieldValue> {
    match field_type {
        FieldType::Bool => text.parse().ok().map(FieldValue::Bool),
        FieldType::Int => text.parse().ok().map(FieldValue::Int),
        FieldType::Long => text.parse().ok().map(FieldValue::Long),
        FieldType::Float => text.parse().ok().map(FieldValue::Float),
        FieldType::Double => text.parse().ok().map(FieldValue::Double),
        FieldType::String => Some(FieldValue::Str(text.to_string())),
        FieldType::Bytes | FieldType::Reference(_) => None,
    }
}
