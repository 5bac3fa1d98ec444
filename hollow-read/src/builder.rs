//! Mutable staging for read states.
//!
//! A [`TypeDataBuilder`] holds decoded rows keyed by ordinal. Freezing is
//! batched: one pass computes every column's bit width, a second fills the
//! packed columns. Snapshot loading, delta application, and the canonical
//! freeze of a write state all funnel through here.

use crate::error::{Error, Result};
use crate::rows::RecordRow;
use crate::state::{
    FieldColumn, ListReadState, MapReadState, ObjectReadState, ReadStateEngine, SetReadState,
    TypeReadState,
};
use hollow_core::memory::{bits_for_max, PackedLongArray};
use hollow_core::{
    FieldType, FieldValue, ObjectSchema, Ordinal, OrdinalBitSet, Schema, SchemaField,
};

/// Decoded-row staging for one type.
#[derive(Clone, Debug)]
pub struct TypeDataBuilder {
    schema: Schema,
    rows: Vec<Option<RecordRow>>,
    populated: OrdinalBitSet,
}

impl TypeDataBuilder {
    /// An empty builder for `schema`.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            populated: OrdinalBitSet::new(),
        }
    }

    /// The builder's schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Live ordinals staged so far.
    pub fn populated(&self) -> &OrdinalBitSet {
        &self.populated
    }

    /// The staged row at `ordinal`.
    pub fn row(&self, ordinal: Ordinal) -> Option<&RecordRow> {
        if !self.populated.get(ordinal) {
            return None;
        }
        self.rows.get(ordinal as usize).and_then(|r| r.as_ref())
    }

    /// Stage `row` at `ordinal`, replacing any prior row.
    pub fn set_row(&mut self, ordinal: Ordinal, row: RecordRow) {
        if self.rows.len() <= ordinal as usize {
            self.rows.resize_with(ordinal as usize + 1, || None);
        }
        self.rows[ordinal as usize] = Some(row);
        self.populated.set(ordinal);
    }

    /// Unstage the row at `ordinal`.
    pub fn clear_row(&mut self, ordinal: Ordinal) {
        if let Some(slot) = self.rows.get_mut(ordinal as usize) {
            *slot = None;
        }
        self.populated.clear(ordinal);
    }

    fn dense_len(&self) -> usize {
        self.populated.max_set_bit().map_or(0, |m| m as usize + 1)
    }

    /// Freeze into an immutable read state, computing bit widths once.
    pub fn freeze(&self) -> Result<TypeReadState> {
        match &self.schema {
            Schema::Object(s) => Ok(TypeReadState::Object(self.freeze_object(s)?)),
            Schema::List(s) => {
                let (elements, ends, len) = self.freeze_single_collection(&s.name, false)?;
                Ok(TypeReadState::List(ListReadState {
                    schema: s.clone(),
                    populated: self.populated.clone(),
                    elements,
                    ends,
                    len,
                }))
            }
            Schema::Set(s) => {
                let (buckets, ends, len) = self.freeze_single_collection(&s.name, true)?;
                Ok(TypeReadState::Set(SetReadState {
                    schema: s.clone(),
                    populated: self.populated.clone(),
                    buckets,
                    ends,
                    len,
                }))
            }
            Schema::Map(s) => {
                let state = self.freeze_map(s.clone())?;
                Ok(TypeReadState::Map(state))
            }
        }
    }

    // ── object columns ──────────────────────────────────────────────────

    fn freeze_object(&self, schema: &ObjectSchema) -> Result<ObjectReadState> {
        let len = self.dense_len();
        for ordinal in self.populated.iter() {
            match self.row(ordinal) {
                Some(RecordRow::Object(values)) if values.len() == schema.fields.len() => {}
                Some(RecordRow::Object(values)) => {
                    return Err(Error::invalid_state(format!(
                        "'{}' row {ordinal} carries {} values for {} fields",
                        schema.name,
                        values.len(),
                        schema.fields.len()
                    )));
                }
                _ => {
                    return Err(Error::invalid_state(format!(
                        "'{}' row {ordinal} is not an object row",
                        schema.name
                    )));
                }
            }
        }
        let columns = schema
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| self.freeze_field(schema, idx, field, len))
            .collect::<Result<Vec<_>>>()?;
        Ok(ObjectReadState {
            schema: schema.clone(),
            populated: self.populated.clone(),
            columns,
            len,
        })
    }

    fn object_value(&self, ordinal: Ordinal, field_idx: usize) -> &FieldValue {
        match self.row(ordinal) {
            Some(RecordRow::Object(values)) => &values[field_idx],
            _ => unreachable!("validated object rows"),
        }
    }

    fn freeze_field(
        &self,
        schema: &ObjectSchema,
        field_idx: usize,
        field: &SchemaField,
        len: usize,
    ) -> Result<FieldColumn> {
        let mismatch = |ordinal: Ordinal, value: &FieldValue| {
            Error::invalid_state(format!(
                "'{}.{}' row {ordinal} holds {value:?}, field type is {}",
                schema.name, field.name, field.field_type
            ))
        };
        match &field.field_type {
            FieldType::Bool => {
                let mut col = PackedLongArray::new(2, len);
                col.fill_null();
                for ordinal in self.populated.iter() {
                    match self.object_value(ordinal, field_idx) {
                        FieldValue::Bool(b) => col.set(ordinal as usize, *b as u64),
                        FieldValue::Null => {}
                        other => return Err(mismatch(ordinal, other)),
                    }
                }
                Ok(FieldColumn::Bool(col))
            }
            FieldType::Int | FieldType::Long => {
                let mut max = 0u64;
                for ordinal in self.populated.iter() {
                    match self.object_value(ordinal, field_idx) {
                        FieldValue::Int(v) if field.field_type == FieldType::Int => {
                            max = max.max(hollow_core::memory::zigzag_encode(*v as i64));
                        }
                        FieldValue::Long(v) if field.field_type == FieldType::Long => {
                            max = max.max(hollow_core::memory::zigzag_encode(*v));
                        }
                        FieldValue::Null => {}
                        other => return Err(mismatch(ordinal, other)),
                    }
                }
                let mut col = PackedLongArray::new(bits_for_max(max), len);
                col.fill_null();
                for ordinal in self.populated.iter() {
                    match self.object_value(ordinal, field_idx) {
                        FieldValue::Int(v) => col.set(
                            ordinal as usize,
                            hollow_core::memory::zigzag_encode(*v as i64),
                        ),
                        FieldValue::Long(v) => {
                            col.set(ordinal as usize, hollow_core::memory::zigzag_encode(*v))
                        }
                        _ => {}
                    }
                }
                if field.field_type == FieldType::Int {
                    Ok(FieldColumn::Int(col))
                } else {
                    Ok(FieldColumn::Long(col))
                }
            }
            FieldType::Float => {
                let mut col = PackedLongArray::new(32, len);
                col.fill_null();
                for ordinal in self.populated.iter() {
                    match self.object_value(ordinal, field_idx) {
                        FieldValue::Float(v) => col.set(ordinal as usize, v.to_bits() as u64),
                        FieldValue::Null => {}
                        other => return Err(mismatch(ordinal, other)),
                    }
                }
                Ok(FieldColumn::Float(col))
            }
            FieldType::Double => {
                let mut col = PackedLongArray::new(64, len);
                col.fill_null();
                for ordinal in self.populated.iter() {
                    match self.object_value(ordinal, field_idx) {
                        FieldValue::Double(v) => col.set(ordinal as usize, v.to_bits()),
                        FieldValue::Null => {}
                        other => return Err(mismatch(ordinal, other)),
                    }
                }
                Ok(FieldColumn::Double(col))
            }
            FieldType::Reference(_) => {
                let mut max = 0u64;
                for ordinal in self.populated.iter() {
                    match self.object_value(ordinal, field_idx) {
                        FieldValue::Ref(Some(child)) => max = max.max(*child as u64),
                        FieldValue::Ref(None) | FieldValue::Null => {}
                        other => return Err(mismatch(ordinal, other)),
                    }
                }
                let mut col = PackedLongArray::new(bits_for_max(max), len);
                col.fill_null();
                for ordinal in self.populated.iter() {
                    if let FieldValue::Ref(Some(child)) = self.object_value(ordinal, field_idx) {
                        col.set(ordinal as usize, *child as u64);
                    }
                }
                Ok(FieldColumn::Ref(col))
            }
            FieldType::String | FieldType::Bytes => {
                let string = field.field_type == FieldType::String;
                let mut heap = Vec::new();
                let mut stored = vec![0u64; len];
                let mut max_stored = 1u64;
                for i in 0..len {
                    let ordinal = i as Ordinal;
                    let value = if self.populated.get(ordinal) {
                        Some(self.object_value(ordinal, field_idx))
                    } else {
                        None
                    };
                    let entry = match value {
                        Some(FieldValue::Str(s)) if string => {
                            heap.extend_from_slice(s.as_bytes());
                            (heap.len() as u64) << 1
                        }
                        Some(FieldValue::Bytes(b)) if !string => {
                            heap.extend_from_slice(b);
                            (heap.len() as u64) << 1
                        }
                        Some(FieldValue::Null) | None => ((heap.len() as u64) << 1) | 1,
                        Some(other) => return Err(mismatch(ordinal, other)),
                    };
                    max_stored = max_stored.max(entry);
                    stored[i] = entry;
                }
                let mut offsets = PackedLongArray::new(bits_for_max(max_stored), len);
                for (i, &v) in stored.iter().enumerate() {
                    offsets.set(i, v);
                }
                Ok(FieldColumn::VarLen {
                    offsets,
                    heap,
                    string,
                })
            }
        }
    }

    // ── collection columns ──────────────────────────────────────────────

    /// Freeze a list's element column or a set's bucket column; `hashed`
    /// switches between plain elements and sentinel-holed buckets.
    fn freeze_single_collection(
        &self,
        type_name: &str,
        hashed: bool,
    ) -> Result<(PackedLongArray, PackedLongArray, usize)> {
        let len = self.dense_len();
        let mut total = 0usize;
        let mut max_elem = 0u64;
        for ordinal in self.populated.iter() {
            match (hashed, self.row(ordinal)) {
                (false, Some(RecordRow::List(elements))) => {
                    total += elements.len();
                    for &e in elements {
                        max_elem = max_elem.max(e as u64);
                    }
                }
                (true, Some(RecordRow::Set(table))) => {
                    total += table.buckets.len();
                    for e in table.iter() {
                        max_elem = max_elem.max(e as u64);
                    }
                }
                _ => {
                    return Err(Error::invalid_state(format!(
                        "'{type_name}' row {ordinal} has the wrong collection shape"
                    )));
                }
            }
        }
        let mut elements = PackedLongArray::new(bits_for_max(max_elem), total);
        let mut ends = PackedLongArray::new(bits_for_max(total as u64), len);
        let sentinel = elements.sentinel();
        let mut pos = 0usize;
        for i in 0..len {
            let ordinal = i as Ordinal;
            if self.populated.get(ordinal) {
                match self.row(ordinal) {
                    Some(RecordRow::List(list_elements)) => {
                        for &e in list_elements {
                            elements.set(pos, e as u64);
                            pos += 1;
                        }
                    }
                    Some(RecordRow::Set(table)) => {
                        for bucket in &table.buckets {
                            elements.set(pos, bucket.map_or(sentinel, |e| e as u64));
                            pos += 1;
                        }
                    }
                    _ => unreachable!("validated above"),
                }
            }
            ends.set(i, pos as u64);
        }
        Ok((elements, ends, len))
    }

    fn freeze_map(&self, schema: hollow_core::MapSchema) -> Result<MapReadState> {
        let len = self.dense_len();
        let mut total = 0usize;
        let mut max_key = 0u64;
        let mut max_value = 0u64;
        for ordinal in self.populated.iter() {
            match self.row(ordinal) {
                Some(RecordRow::Map(table)) => {
                    total += table.buckets.len();
                    for (k, v) in table.iter() {
                        max_key = max_key.max(k as u64);
                        max_value = max_value.max(v as u64);
                    }
                }
                _ => {
                    return Err(Error::invalid_state(format!(
                        "'{}' row {ordinal} is not a map row",
                        schema.name
                    )));
                }
            }
        }
        let mut key_buckets = PackedLongArray::new(bits_for_max(max_key), total);
        let mut value_buckets = PackedLongArray::new(bits_for_max(max_value), total);
        let mut ends = PackedLongArray::new(bits_for_max(total as u64), len);
        let key_sentinel = key_buckets.sentinel();
        let value_sentinel = value_buckets.sentinel();
        let mut pos = 0usize;
        for i in 0..len {
            let ordinal = i as Ordinal;
            if self.populated.get(ordinal) {
                if let Some(RecordRow::Map(table)) = self.row(ordinal) {
                    for bucket in &table.buckets {
                        match bucket {
                            Some((k, v)) => {
                                key_buckets.set(pos, *k as u64);
                                value_buckets.set(pos, *v as u64);
                            }
                            None => {
                                key_buckets.set(pos, key_sentinel);
                                value_buckets.set(pos, value_sentinel);
                            }
                        }
                        pos += 1;
                    }
                }
            }
            ends.set(i, pos as u64);
        }
        Ok(MapReadState {
            schema,
            populated: self.populated.clone(),
            key_buckets,
            value_buckets,
            ends,
            len,
        })
    }
}

/// Freeze one builder per schema into a full engine.
pub fn freeze_engine(
    schemas: std::sync::Arc<hollow_core::SchemaSet>,
    builders: &[TypeDataBuilder],
) -> Result<ReadStateEngine> {
    let types = builders
        .iter()
        .map(TypeDataBuilder::freeze)
        .collect::<Result<Vec<_>>>()?;
    ReadStateEngine::new(schemas, types)
}
