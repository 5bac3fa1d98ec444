//! Immutable columnar read states.
//!
//! A [`ReadStateEngine`] holds one [`TypeReadState`] per schema. Columns
//! are dense over `[0, max_ordinal]`: packed numeric/reference columns with
//! the all-ones null sentinel, end-offset + shared-heap columns for
//! variable-length fields, and concatenated bucket tables for sets and
//! maps. All reads are lock-free; consumers share the engine via `Arc` and
//! observe promotion as a single reference swap.
//!
//! Signed integers are zigzag-encoded, so `i64::MIN` (whose zigzag form is
//! the 64-bit sentinel) and the all-ones IEEE bit patterns are reserved and
//! decode as null.

use crate::builder::TypeDataBuilder;
use crate::rows::{MapTable, RecordRow, SetTable};
use hollow_core::memory::{zigzag_decode, PackedLongArray};
use hollow_core::{
    FieldValue, ListSchema, MapSchema, ObjectSchema, Ordinal, OrdinalBitSet, Schema, SchemaSet,
    SetSchema,
};
use std::sync::Arc;

/// One packed column of an object type.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum FieldColumn {
    Bool(PackedLongArray),
    Int(PackedLongArray),
    Long(PackedLongArray),
    Float(PackedLongArray),
    Double(PackedLongArray),
    Ref(PackedLongArray),
    VarLen {
        /// Per ordinal: `(end << 1) | is_null`; starts chain through nulls.
        offsets: PackedLongArray,
        heap: Vec<u8>,
        string: bool,
    },
}

/// Read state of an object type.
#[derive(Clone, Debug)]
pub struct ObjectReadState {
    pub(crate) schema: ObjectSchema,
    pub(crate) populated: OrdinalBitSet,
    pub(crate) columns: Vec<FieldColumn>,
    /// Dense length: `max_ordinal + 1`.
    pub(crate) len: usize,
}

impl ObjectReadState {
    /// The object schema.
    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    /// Live ordinals.
    pub fn populated_ordinals(&self) -> &OrdinalBitSet {
        &self.populated
    }

    /// Read one field; `None` is null (including the null reference and
    /// any ordinal outside the dense range).
    pub fn read_field(&self, ordinal: Ordinal, field_idx: usize) -> Option<FieldValue> {
        if ordinal as usize >= self.len {
            return None;
        }
        let i = ordinal as usize;
        match &self.columns[field_idx] {
            FieldColumn::Bool(col) => {
                let v = col.get(i);
                (v != col.sentinel()).then(|| FieldValue::Bool(v == 1))
            }
            FieldColumn::Int(col) => {
                let v = col.get(i);
                (v != col.sentinel()).then(|| FieldValue::Int(zigzag_decode(v) as i32))
            }
            FieldColumn::Long(col) => {
                let v = col.get(i);
                (v != col.sentinel()).then(|| FieldValue::Long(zigzag_decode(v)))
            }
            FieldColumn::Float(col) => {
                let v = col.get(i);
                (v != col.sentinel()).then(|| FieldValue::Float(f32::from_bits(v as u32)))
            }
            FieldColumn::Double(col) => {
                let v = col.get(i);
                (v != col.sentinel()).then(|| FieldValue::Double(f64::from_bits(v)))
            }
            FieldColumn::Ref(col) => {
                let v = col.get(i);
                (v != col.sentinel()).then(|| FieldValue::Ref(Some(v as Ordinal)))
            }
            FieldColumn::VarLen {
                offsets,
                heap,
                string,
            } => {
                let stored = offsets.get(i);
                if stored & 1 == 1 {
                    return None;
                }
                let start = if i == 0 {
                    0
                } else {
                    (offsets.get(i - 1) >> 1) as usize
                };
                let end = (stored >> 1) as usize;
                let bytes = &heap[start..end];
                if *string {
                    std::str::from_utf8(bytes)
                        .ok()
                        .map(|s| FieldValue::Str(s.to_string()))
                } else {
                    Some(FieldValue::Bytes(bytes.to_vec()))
                }
            }
        }
    }

    /// Read a reference field's child ordinal; `None` is the null
    /// reference.
    pub fn read_reference(&self, ordinal: Ordinal, field_idx: usize) -> Option<Ordinal> {
        if ordinal as usize >= self.len {
            return None;
        }
        match &self.columns[field_idx] {
            FieldColumn::Ref(col) => {
                let v = col.get(ordinal as usize);
                (v != col.sentinel()).then_some(v as Ordinal)
            }
            _ => None,
        }
    }

    fn decode_row(&self, ordinal: Ordinal) -> RecordRow {
        let values = (0..self.columns.len())
            .map(|idx| {
                match (&self.columns[idx], self.read_field(ordinal, idx)) {
                    // a null reference decodes to the typed null form
                    (FieldColumn::Ref(_), None) => FieldValue::Ref(None),
                    (_, None) => FieldValue::Null,
                    (_, Some(v)) => v,
                }
            })
            .collect();
        RecordRow::Object(values)
    }
}

fn collection_bounds(ends: &PackedLongArray, ordinal: Ordinal) -> (usize, usize) {
    let i = ordinal as usize;
    let start = if i == 0 { 0 } else { ends.get(i - 1) as usize };
    (start, ends.get(i) as usize)
}

/// Read state of a list type.
#[derive(Clone, Debug)]
pub struct ListReadState {
    pub(crate) schema: ListSchema,
    pub(crate) populated: OrdinalBitSet,
    pub(crate) elements: PackedLongArray,
    pub(crate) ends: PackedLongArray,
    pub(crate) len: usize,
}

impl ListReadState {
    /// The list schema.
    pub fn schema(&self) -> &ListSchema {
        &self.schema
    }

    /// Live ordinals.
    pub fn populated_ordinals(&self) -> &OrdinalBitSet {
        &self.populated
    }

    /// Element ordinals of the record at `ordinal`, in list order.
    pub fn elements(&self, ordinal: Ordinal) -> Vec<Ordinal> {
        if ordinal as usize >= self.len {
            return Vec::new();
        }
        let (start, end) = collection_bounds(&self.ends, ordinal);
        (start..end)
            .map(|i| self.elements.get(i) as Ordinal)
            .collect()
    }
}

/// Read state of a set type.
#[derive(Clone, Debug)]
pub struct SetReadState {
    pub(crate) schema: SetSchema,
    pub(crate) populated: OrdinalBitSet,
    /// Concatenated power-of-two bucket tables; sentinel = empty slot.
    pub(crate) buckets: PackedLongArray,
    pub(crate) ends: PackedLongArray,
    pub(crate) len: usize,
}

impl SetReadState {
    /// The set schema.
    pub fn schema(&self) -> &SetSchema {
        &self.schema
    }

    /// Live ordinals.
    pub fn populated_ordinals(&self) -> &OrdinalBitSet {
        &self.populated
    }

    /// Element ordinals in bucket order.
    pub fn iter_elements(&self, ordinal: Ordinal) -> Vec<Ordinal> {
        self.table(ordinal).iter().collect()
    }

    fn table(&self, ordinal: Ordinal) -> SetTable {
        if ordinal as usize >= self.len {
            return SetTable::default();
        }
        let (start, end) = collection_bounds(&self.ends, ordinal);
        let sentinel = self.buckets.sentinel();
        SetTable {
            buckets: (start..end)
                .map(|i| {
                    let v = self.buckets.get(i);
                    (v != sentinel).then_some(v as Ordinal)
                })
                .collect(),
        }
    }
}

/// Read state of a map type.
#[derive(Clone, Debug)]
pub struct MapReadState {
    pub(crate) schema: MapSchema,
    pub(crate) populated: OrdinalBitSet,
    pub(crate) key_buckets: PackedLongArray,
    pub(crate) value_buckets: PackedLongArray,
    pub(crate) ends: PackedLongArray,
    pub(crate) len: usize,
}

impl MapReadState {
    /// The map schema.
    pub fn schema(&self) -> &MapSchema {
        &self.schema
    }

    /// Live ordinals.
    pub fn populated_ordinals(&self) -> &OrdinalBitSet {
        &self.populated
    }

    /// Key/value ordinal pairs in bucket order.
    pub fn iter_entries(&self, ordinal: Ordinal) -> Vec<(Ordinal, Ordinal)> {
        self.table(ordinal).iter().collect()
    }

    fn table(&self, ordinal: Ordinal) -> MapTable {
        if ordinal as usize >= self.len {
            return MapTable::default();
        }
        let (start, end) = collection_bounds(&self.ends, ordinal);
        let sentinel = self.key_buckets.sentinel();
        MapTable {
            buckets: (start..end)
                .map(|i| {
                    let k = self.key_buckets.get(i);
                    (k != sentinel)
                        .then(|| (k as Ordinal, self.value_buckets.get(i) as Ordinal))
                })
                .collect(),
        }
    }
}

/// The read state of one type.
#[derive(Clone, Debug)]
pub enum TypeReadState {
    Object(ObjectReadState),
    List(ListReadState),
    Set(SetReadState),
    Map(MapReadState),
}

impl TypeReadState {
    /// The type's name.
    pub fn name(&self) -> &str {
        match self {
            TypeReadState::Object(s) => &s.schema.name,
            TypeReadState::List(s) => &s.schema.name,
            TypeReadState::Set(s) => &s.schema.name,
            TypeReadState::Map(s) => &s.schema.name,
        }
    }

    /// Live ordinals.
    pub fn populated_ordinals(&self) -> &OrdinalBitSet {
        match self {
            TypeReadState::Object(s) => &s.populated,
            TypeReadState::List(s) => &s.populated,
            TypeReadState::Set(s) => &s.populated,
            TypeReadState::Map(s) => &s.populated,
        }
    }

    /// The object state, if this type is an object.
    pub fn as_object(&self) -> Option<&ObjectReadState> {
        match self {
            TypeReadState::Object(s) => Some(s),
            _ => None,
        }
    }

    /// The full schema node.
    pub fn schema(&self) -> Schema {
        match self {
            TypeReadState::Object(s) => Schema::Object(s.schema.clone()),
            TypeReadState::List(s) => Schema::List(s.schema.clone()),
            TypeReadState::Set(s) => Schema::Set(s.schema.clone()),
            TypeReadState::Map(s) => Schema::Map(s.schema.clone()),
        }
    }

    /// Decode the record at `ordinal` into its value-level row, `None`
    /// when the ordinal is not populated.
    pub fn decode_row(&self, ordinal: Ordinal) -> Option<RecordRow> {
        if !self.populated_ordinals().get(ordinal) {
            return None;
        }
        Some(match self {
            TypeReadState::Object(s) => s.decode_row(ordinal),
            TypeReadState::List(s) => RecordRow::List(s.elements(ordinal)),
            TypeReadState::Set(s) => RecordRow::Set(s.table(ordinal)),
            TypeReadState::Map(s) => RecordRow::Map(s.table(ordinal)),
        })
    }

    /// Decode every populated row into a builder for mutation.
    pub fn to_builder(&self) -> TypeDataBuilder {
        let mut builder = TypeDataBuilder::new(self.schema());
        for ordinal in self.populated_ordinals().iter() {
            if let Some(row) = self.decode_row(ordinal) {
                builder.set_row(ordinal, row);
            }
        }
        builder
    }
}

/// The full immutable read state of a dataset.
#[derive(Clone, Debug)]
pub struct ReadStateEngine {
    schemas: Arc<SchemaSet>,
    types: Vec<TypeReadState>,
}

impl ReadStateEngine {
    /// Assemble an engine from per-type states in schema order.
    pub fn new(schemas: Arc<SchemaSet>, types: Vec<TypeReadState>) -> crate::Result<Self> {
        if types.len() != schemas.len() {
            return Err(crate::Error::invalid_state(format!(
                "{} type states for {} schemas",
                types.len(),
                schemas.len()
            )));
        }
        for (schema, state) in schemas.iter().zip(types.iter()) {
            if schema.name() != state.name() {
                return Err(crate::Error::invalid_state(format!(
                    "type state '{}' out of order, expected '{}'",
                    state.name(),
                    schema.name()
                )));
            }
        }
        Ok(Self { schemas, types })
    }

    /// An engine with every type empty.
    pub fn empty(schemas: Arc<SchemaSet>) -> crate::Result<Self> {
        let types = schemas
            .iter()
            .map(|schema| TypeDataBuilder::new(schema.clone()).freeze())
            .collect::<crate::Result<Vec<_>>>()?;
        Self::new(schemas, types)
    }

    /// The dataset's schema set.
    pub fn schemas(&self) -> &Arc<SchemaSet> {
        &self.schemas
    }

    /// The named type's read state.
    pub fn type_state(&self, type_name: &str) -> Option<&TypeReadState> {
        self.schemas
            .position(type_name)
            .map(|idx| &self.types[idx])
    }

    /// Type states in schema order.
    pub fn type_states(&self) -> std::slice::Iter<'_, TypeReadState> {
        self.types.iter()
    }

    /// Value-level equality: same schemas, same populated sets, identical
    /// decoded rows. Packed widths are free to differ.
    pub fn state_equals(&self, other: &ReadStateEngine) -> bool {
        if *self.schemas != *other.schemas {
            return false;
        }
        self.types.iter().zip(other.types.iter()).all(|(a, b)| {
            a.populated_ordinals() == b.populated_ordinals()
                && a.populated_ordinals()
                    .iter()
                    .all(|o| a.decode_row(o) == b.decode_row(o))
        })
    }
}
