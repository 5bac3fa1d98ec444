//! Sparse column codec for typed sections.
//!
//! A section encodes rows for a subset of ordinals (the populated set in a
//! snapshot, the written set in a delta). Columns carry values for exactly
//! those ordinals, ascending; the section's bitsets map positions back to
//! ordinals. Variable-length columns ship their own heap, so offsets are
//! blob-local.
//!
//! Numeric and reference widths are taken from [`ColumnMaxes`], which a
//! delta pair computes over the union of both directions' values so the
//! forward and reverse payloads share a width.

use crate::error::Result;
use hollow_core::memory::{
    bits_for_max, read_uvarint_len, write_uvarint, zigzag_decode, zigzag_encode, PackedLongArray,
};
use hollow_core::{Error as CoreError, FieldType, FieldValue, Ordinal, Schema};
use hollow_read::{MapTable, RecordRow, SetTable};

/// Per-column maximum packed magnitudes: zigzag values for integers,
/// ordinals for references and collection elements. One slot per column,
/// zero where widths are fixed.
#[derive(Clone, Debug, Default)]
pub(crate) struct ColumnMaxes {
    values: Vec<u64>,
}

impl ColumnMaxes {
    /// Elementwise maximum of two stats.
    pub fn merge(mut self, other: &ColumnMaxes) -> ColumnMaxes {
        if other.values.len() > self.values.len() {
            self.values.resize(other.values.len(), 0);
        }
        for (v, o) in self.values.iter_mut().zip(other.values.iter()) {
            *v = (*v).max(*o);
        }
        self
    }

    fn get(&self, idx: usize) -> u64 {
        self.values.get(idx).copied().unwrap_or(0)
    }
}

/// Scan rows for the per-column maxima the packed widths derive from.
pub(crate) fn column_maxes<'a>(
    schema: &Schema,
    rows: impl Iterator<Item = &'a RecordRow>,
) -> ColumnMaxes {
    let mut values = match schema {
        Schema::Object(s) => vec![0u64; s.fields.len()],
        Schema::List(_) | Schema::Set(_) => vec![0u64; 1],
        Schema::Map(_) => vec![0u64; 2],
    };
    for row in rows {
        match (schema, row) {
            (Schema::Object(s), RecordRow::Object(row_values)) => {
                for (idx, (field, value)) in s.fields.iter().zip(row_values.iter()).enumerate() {
                    let magnitude = match (&field.field_type, value) {
                        (FieldType::Int, FieldValue::Int(v)) => zigzag_encode(*v as i64),
                        (FieldType::Long, FieldValue::Long(v)) => zigzag_encode(*v),
                        (FieldType::Reference(_), FieldValue::Ref(Some(o))) => *o as u64,
                        _ => 0,
                    };
                    values[idx] = values[idx].max(magnitude);
                }
            }
            (Schema::List(_), RecordRow::List(elements)) => {
                for &e in elements {
                    values[0] = values[0].max(e as u64);
                }
            }
            (Schema::Set(_), RecordRow::Set(table)) => {
                for e in table.iter() {
                    values[0] = values[0].max(e as u64);
                }
            }
            (Schema::Map(_), RecordRow::Map(table)) => {
                for (k, v) in table.iter() {
                    values[0] = values[0].max(k as u64);
                    values[1] = values[1].max(v as u64);
                }
            }
            _ => {}
        }
    }
    ColumnMaxes { values }
}

fn shape_error(schema: &Schema) -> crate::Error {
    CoreError::invalid_record(format!(
        "row shape does not match schema '{}'",
        schema.name()
    ))
    .into()
}

/// Encode the column payloads for `rows` (ascending ordinal order).
pub(crate) fn encode_columns(
    out: &mut Vec<u8>,
    schema: &Schema,
    rows: &[&RecordRow],
    maxes: &ColumnMaxes,
) -> Result<()> {
    match schema {
        Schema::Object(s) => {
            for (idx, field) in s.fields.iter().enumerate() {
                match &field.field_type {
                    FieldType::String | FieldType::Bytes => {
                        encode_varlen_column(out, schema, rows, idx, &field.field_type)?;
                    }
                    _ => {
                        let bits = fixed_field_bits(&field.field_type, maxes.get(idx));
                        let mut col = PackedLongArray::new(bits, rows.len());
                        col.fill_null();
                        for (i, row) in rows.iter().enumerate() {
                            let RecordRow::Object(values) = row else {
                                return Err(shape_error(schema));
                            };
                            if let Some(stored) =
                                encode_scalar(&field.field_type, &values[idx], schema)?
                            {
                                col.set(i, stored);
                            }
                        }
                        col.write_to(out);
                    }
                }
            }
            Ok(())
        }
        Schema::List(_) => {
            let mut elements = Vec::new();
            let mut ends = Vec::with_capacity(rows.len());
            for row in rows {
                let RecordRow::List(list_elements) = row else {
                    return Err(shape_error(schema));
                };
                elements.extend(list_elements.iter().map(|&e| e as u64));
                ends.push(elements.len() as u64);
            }
            write_packed(out, bits_for_max(maxes.get(0)), &elements);
            write_packed(out, bits_for_max(elements.len() as u64), &ends);
            Ok(())
        }
        Schema::Set(_) => {
            let bits = bits_for_max(maxes.get(0));
            let sentinel = hollow_core::memory::null_sentinel(bits);
            let mut buckets = Vec::new();
            let mut ends = Vec::with_capacity(rows.len());
            for row in rows {
                let RecordRow::Set(table) = row else {
                    return Err(shape_error(schema));
                };
                buckets.extend(
                    table
                        .buckets
                        .iter()
                        .map(|b| b.map_or(sentinel, |e| e as u64)),
                );
                ends.push(buckets.len() as u64);
            }
            write_packed(out, bits, &buckets);
            write_packed(out, bits_for_max(buckets.len() as u64), &ends);
            Ok(())
        }
        Schema::Map(_) => {
            let key_bits = bits_for_max(maxes.get(0));
            let value_bits = bits_for_max(maxes.get(1));
            let key_sentinel = hollow_core::memory::null_sentinel(key_bits);
            let value_sentinel = hollow_core::memory::null_sentinel(value_bits);
            let mut keys = Vec::new();
            let mut values = Vec::new();
            let mut ends = Vec::with_capacity(rows.len());
            for row in rows {
                let RecordRow::Map(table) = row else {
                    return Err(shape_error(schema));
                };
                for bucket in &table.buckets {
                    match bucket {
                        Some((k, v)) => {
                            keys.push(*k as u64);
                            values.push(*v as u64);
                        }
                        None => {
                            keys.push(key_sentinel);
                            values.push(value_sentinel);
                        }
                    }
                }
                ends.push(keys.len() as u64);
            }
            write_packed(out, key_bits, &keys);
            write_packed(out, value_bits, &values);
            write_packed(out, bits_for_max(keys.len() as u64), &ends);
            Ok(())
        }
    }
}

fn fixed_field_bits(field_type: &FieldType, max: u64) -> u8 {
    match field_type {
        FieldType::Bool => 2,
        FieldType::Float => 32,
        FieldType::Double => 64,
        FieldType::Int | FieldType::Long | FieldType::Reference(_) => bits_for_max(max),
        FieldType::String | FieldType::Bytes => unreachable!("var-length columns"),
    }
}

/// The packed form of one scalar value; `None` keeps the null sentinel.
fn encode_scalar(
    field_type: &FieldType,
    value: &FieldValue,
    schema: &Schema,
) -> Result<Option<u64>> {
    Ok(match (field_type, value) {
        (_, FieldValue::Null) | (FieldType::Reference(_), FieldValue::Ref(None)) => None,
        (FieldType::Bool, FieldValue::Bool(b)) => Some(*b as u64),
        (FieldType::Int, FieldValue::Int(v)) => Some(zigzag_encode(*v as i64)),
        (FieldType::Long, FieldValue::Long(v)) => Some(zigzag_encode(*v)),
        (FieldType::Float, FieldValue::Float(v)) => Some(v.to_bits() as u64),
        (FieldType::Double, FieldValue::Double(v)) => Some(v.to_bits()),
        (FieldType::Reference(_), FieldValue::Ref(Some(o))) => Some(*o as u64),
        _ => return Err(shape_error(schema)),
    })
}

fn encode_varlen_column(
    out: &mut Vec<u8>,
    schema: &Schema,
    rows: &[&RecordRow],
    field_idx: usize,
    field_type: &FieldType,
) -> Result<()> {
    let string = *field_type == FieldType::String;
    let mut heap = Vec::new();
    let mut stored = Vec::with_capacity(rows.len());
    let mut max_stored = 1u64;
    for row in rows {
        let RecordRow::Object(values) = row else {
            return Err(shape_error(schema));
        };
        let entry = match &values[field_idx] {
            FieldValue::Str(s) if string => {
                heap.extend_from_slice(s.as_bytes());
                (heap.len() as u64) << 1
            }
            FieldValue::Bytes(b) if !string => {
                heap.extend_from_slice(b);
                (heap.len() as u64) << 1
            }
            FieldValue::Null => ((heap.len() as u64) << 1) | 1,
            _ => return Err(shape_error(schema)),
        };
        max_stored = max_stored.max(entry);
        stored.push(entry);
    }
    write_uvarint(out, heap.len() as u64);
    out.extend_from_slice(&heap);
    write_packed(out, bits_for_max(max_stored), &stored);
    Ok(())
}

fn write_packed(out: &mut Vec<u8>, bits: u8, values: &[u64]) {
    let mut col = PackedLongArray::new(bits, values.len());
    for (i, &v) in values.iter().enumerate() {
        col.set(i, v);
    }
    col.write_to(out);
}

fn read_packed(input: &mut &[u8], expected_len: usize, what: &str) -> Result<PackedLongArray> {
    let col = PackedLongArray::read_from(input)?;
    if col.len() != expected_len {
        return Err(CoreError::truncated(format!(
            "{what}: {} values, expected {expected_len}",
            col.len()
        ))
        .into());
    }
    Ok(col)
}

/// Decode the column payloads for `count` rows.
pub(crate) fn decode_columns(
    input: &mut &[u8],
    schema: &Schema,
    count: usize,
) -> Result<Vec<RecordRow>> {
    match schema {
        Schema::Object(s) => {
            let mut per_field: Vec<Vec<FieldValue>> = Vec::with_capacity(s.fields.len());
            for field in &s.fields {
                per_field.push(match &field.field_type {
                    FieldType::String | FieldType::Bytes => {
                        decode_varlen_column(input, count, &field.field_type)?
                    }
                    _ => {
                        let col = read_packed(input, count, "scalar column")?;
                        (0..count)
                            .map(|i| decode_scalar(&field.field_type, &col, i))
                            .collect()
                    }
                });
            }
            Ok((0..count)
                .map(|i| {
                    RecordRow::Object(
                        per_field.iter().map(|column| column[i].clone()).collect(),
                    )
                })
                .collect())
        }
        Schema::List(_) => {
            let elements = PackedLongArray::read_from(input)?;
            let ends = read_packed(input, count, "list ends")?;
            collect_ranges(&ends, elements.len(), count, |start, end| {
                RecordRow::List(
                    (start..end)
                        .map(|i| elements.get(i) as Ordinal)
                        .collect(),
                )
            })
        }
        Schema::Set(_) => {
            let buckets = PackedLongArray::read_from(input)?;
            let ends = read_packed(input, count, "set ends")?;
            let sentinel = buckets.sentinel();
            collect_ranges(&ends, buckets.len(), count, |start, end| {
                RecordRow::Set(SetTable {
                    buckets: (start..end)
                        .map(|i| {
                            let v = buckets.get(i);
                            (v != sentinel).then_some(v as Ordinal)
                        })
                        .collect(),
                })
            })
        }
        Schema::Map(_) => {
            let keys = PackedLongArray::read_from(input)?;
            let values = read_packed(input, keys.len(), "map values")?;
            let ends = read_packed(input, count, "map ends")?;
            let sentinel = keys.sentinel();
            collect_ranges(&ends, keys.len(), count, |start, end| {
                RecordRow::Map(MapTable {
                    buckets: (start..end)
                        .map(|i| {
                            let k = keys.get(i);
                            (k != sentinel).then(|| (k as Ordinal, values.get(i) as Ordinal))
                        })
                        .collect(),
                })
            })
        }
    }
}

fn decode_scalar(field_type: &FieldType, col: &PackedLongArray, i: usize) -> FieldValue {
    let v = col.get(i);
    if v == col.sentinel() {
        return match field_type {
            FieldType::Reference(_) => FieldValue::Ref(None),
            _ => FieldValue::Null,
        };
    }
    match field_type {
        FieldType::Bool => FieldValue::Bool(v == 1),
        FieldType::Int => FieldValue::Int(zigzag_decode(v) as i32),
        FieldType::Long => FieldValue::Long(zigzag_decode(v)),
        FieldType::Float => FieldValue::Float(f32::from_bits(v as u32)),
        FieldType::Double => FieldValue::Double(f64::from_bits(v)),
        FieldType::Reference(_) => FieldValue::Ref(Some(v as Ordinal)),
        FieldType::String | FieldType::Bytes => unreachable!("var-length columns"),
    }
}

fn decode_varlen_column(
    input: &mut &[u8],
    count: usize,
    field_type: &FieldType,
) -> Result<Vec<FieldValue>> {
    let heap_len = read_uvarint_len(input)?;
    if input.len() < heap_len {
        return Err(CoreError::truncated("var-length heap").into());
    }
    let (heap, rest) = input.split_at(heap_len);
    *input = rest;
    let offsets = read_packed(input, count, "var-length offsets")?;
    let string = *field_type == FieldType::String;
    let mut values = Vec::with_capacity(count);
    let mut start = 0usize;
    for i in 0..count {
        let stored = offsets.get(i);
        let end = (stored >> 1) as usize;
        if end > heap_len || end < start {
            return Err(CoreError::truncated("var-length offsets out of range").into());
        }
        if stored & 1 == 1 {
            values.push(FieldValue::Null);
        } else if string {
            let s = std::str::from_utf8(&heap[start..end])
                .map_err(|_| CoreError::truncated("var-length heap is not UTF-8"))?;
            values.push(FieldValue::Str(s.to_string()));
        } else {
            values.push(FieldValue::Bytes(heap[start..end].to_vec()));
        }
        start = end;
    }
    Ok(values)
}

fn collect_ranges(
    ends: &PackedLongArray,
    total: usize,
    count: usize,
    mut make: impl FnMut(usize, usize) -> RecordRow,
) -> Result<Vec<RecordRow>> {
    let mut rows = Vec::with_capacity(count);
    let mut start = 0usize;
    for i in 0..count {
        let end = ends.get(i) as usize;
        if end > total || end < start {
            return Err(CoreError::truncated("collection ends out of range").into());
        }
        rows.push(make(start, end));
        start = end;
    }
    Ok(rows)
}
