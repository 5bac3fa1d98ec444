//! Field values and staged records.
//!
//! [`WriteRecord`] is the payload a population task hands to the write
//! state engine; [`FieldValue`] is one object field. The canonical byte
//! form defined here feeds content-hash deduplication and primary-key
//! identity, so it must be stable: sets are sorted and de-duplicated, maps
//! are sorted by key ordinal.

use crate::error::{Error, Result};
use crate::memory::{write_uvarint, zigzag_encode};
use crate::schema::{FieldType, ObjectSchema};
use crate::Ordinal;

/// One object field's value.
///
/// Equality is byte-level: floats compare by bit pattern, so equal-bit NaN
/// payloads are equal. This matches the canonical-bytes identity used for
/// deduplication and state comparison.
#[derive(Clone, Debug)]
pub enum FieldValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// A child ordinal in the referenced type; `None` is the null reference.
    Ref(Option<Ordinal>),
    Null,
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            (FieldValue::Long(a), FieldValue::Long(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Double(a), FieldValue::Double(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Str(a), FieldValue::Str(b)) => a == b,
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => a == b,
            (FieldValue::Ref(a), FieldValue::Ref(b)) => a == b,
            (FieldValue::Null, FieldValue::Null) => true,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    /// True when this value can populate a field of `field_type`.
    pub fn matches(&self, field_type: &FieldType) -> bool {
        matches!(
            (self, field_type),
            (FieldValue::Null, _)
                | (FieldValue::Bool(_), FieldType::Bool)
                | (FieldValue::Int(_), FieldType::Int)
                | (FieldValue::Long(_), FieldType::Long)
                | (FieldValue::Float(_), FieldType::Float)
                | (FieldValue::Double(_), FieldType::Double)
                | (FieldValue::Str(_), FieldType::String)
                | (FieldValue::Bytes(_), FieldType::Bytes)
                | (FieldValue::Ref(_), FieldType::Reference(_))
        )
    }

    /// True for `Null` and for the null reference.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null | FieldValue::Ref(None))
    }

    fn canonical_append(&self, out: &mut Vec<u8>) {
        match self {
            FieldValue::Null => out.push(0),
            FieldValue::Bool(b) => {
                out.push(1);
                out.push(*b as u8);
            }
            FieldValue::Int(v) => {
                out.push(2);
                write_uvarint(out, zigzag_encode(*v as i64));
            }
            FieldValue::Long(v) => {
                out.push(3);
                write_uvarint(out, zigzag_encode(*v));
            }
            FieldValue::Float(v) => {
                out.push(4);
                out.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            FieldValue::Double(v) => {
                out.push(5);
                out.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            FieldValue::Str(s) => {
                out.push(6);
                write_uvarint(out, s.len() as u64);
                out.extend_from_slice(s.as_bytes());
            }
            FieldValue::Bytes(b) => {
                out.push(7);
                write_uvarint(out, b.len() as u64);
                out.extend_from_slice(b);
            }
            FieldValue::Ref(ord) => {
                out.push(8);
                write_uvarint(out, ord.map_or(0, |o| o as u64 + 1));
            }
        }
    }
}

/// A staged record, shaped per its schema variant.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteRecord {
    /// One value per schema field, in field order.
    Object(Vec<FieldValue>),
    /// Ordered element ordinals.
    List(Vec<Ordinal>),
    /// Element ordinals; canonicalised to a sorted, duplicate-free form.
    Set(Vec<Ordinal>),
    /// Key/value ordinal pairs; canonicalised to key-sorted form.
    Map(Vec<(Ordinal, Ordinal)>),
}

impl WriteRecord {
    /// Canonicalise collection ordering in place. Duplicate set elements
    /// collapse; duplicate map keys are rejected.
    pub fn canonicalise(&mut self) -> Result<()> {
        match self {
            WriteRecord::Object(_) | WriteRecord::List(_) => Ok(()),
            WriteRecord::Set(elements) => {
                elements.sort_unstable();
                elements.dedup();
                Ok(())
            }
            WriteRecord::Map(entries) => {
                entries.sort_unstable();
                for pair in entries.windows(2) {
                    if pair[0].0 == pair[1].0 {
                        return Err(Error::invalid_record(format!(
                            "duplicate map key ordinal {}",
                            pair[0].0
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    /// Check an object record against its schema's field list.
    pub fn check_object(&self, schema: &ObjectSchema) -> Result<()> {
        let WriteRecord::Object(values) = self else {
            return Err(Error::invalid_record(format!(
                "'{}' expects an object record",
                schema.name
            )));
        };
        if values.len() != schema.fields.len() {
            return Err(Error::invalid_record(format!(
                "'{}' has {} fields, record carries {}",
                schema.name,
                schema.fields.len(),
                values.len()
            )));
        }
        for (value, field) in values.iter().zip(schema.fields.iter()) {
            if !value.matches(&field.field_type) {
                return Err(Error::invalid_record(format!(
                    "field '{}.{}' expects {}, got {:?}",
                    schema.name, field.name, field.field_type, value
                )));
            }
        }
        Ok(())
    }

    /// The stable byte form used for content hashing. Call
    /// [`canonicalise`](Self::canonicalise) first.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        match self {
            WriteRecord::Object(values) => {
                out.push(0);
                for value in values {
                    value.canonical_append(&mut out);
                }
            }
            WriteRecord::List(elements) => {
                out.push(1);
                write_uvarint(&mut out, elements.len() as u64);
                for &e in elements {
                    write_uvarint(&mut out, e as u64);
                }
            }
            WriteRecord::Set(elements) => {
                out.push(2);
                write_uvarint(&mut out, elements.len() as u64);
                for &e in elements {
                    write_uvarint(&mut out, e as u64);
                }
            }
            WriteRecord::Map(entries) => {
                out.push(3);
                write_uvarint(&mut out, entries.len() as u64);
                for &(k, v) in entries {
                    write_uvarint(&mut out, k as u64);
                    write_uvarint(&mut out, v as u64);
                }
            }
        }
        out
    }
}
