//! Typed per-type sections.
//!
//! `<tag:1><typeName:UTF><payload>`. Snapshot payload: populated bitset +
//! columns for every populated ordinal. Delta payload: cleared bitset,
//! written bitset, columns for the written ordinals.

use crate::columns::{decode_columns, encode_columns, ColumnMaxes};
use crate::error::Result;
use crate::format::BlobKind;
use hollow_core::memory::{read_utf, write_utf};
use hollow_core::{Error as CoreError, Ordinal, OrdinalBitSet, Schema};
use hollow_read::RecordRow;

/// A decoded typed section.
pub(crate) struct Section {
    pub kind: BlobKind,
    /// Ordinals removed by this payload (empty for snapshots).
    pub cleared: OrdinalBitSet,
    /// Ordinals written by this payload (the populated set for snapshots).
    pub written: OrdinalBitSet,
    /// One row per written ordinal, ascending.
    pub rows: Vec<RecordRow>,
}

/// Append a snapshot section for `schema`.
pub(crate) fn write_snapshot_section(
    out: &mut Vec<u8>,
    schema: &Schema,
    populated: &OrdinalBitSet,
    rows: &[&RecordRow],
    maxes: &ColumnMaxes,
) -> Result<()> {
    out.push(BlobKind::Snapshot.section_tag());
    write_utf(out, schema.name());
    populated.write_to(out);
    encode_columns(out, schema, rows, maxes)
}

/// Append a delta (or reverse-delta) section for `schema`.
pub(crate) fn write_delta_section(
    out: &mut Vec<u8>,
    kind: BlobKind,
    schema: &Schema,
    cleared: &OrdinalBitSet,
    written: &OrdinalBitSet,
    rows: &[&RecordRow],
    maxes: &ColumnMaxes,
) -> Result<()> {
    out.push(kind.section_tag());
    write_utf(out, schema.name());
    cleared.write_to(out);
    written.write_to(out);
    encode_columns(out, schema, rows, maxes)
}

/// Read the next section; the type name must match `schema`.
pub(crate) fn read_section(input: &mut &[u8], schema: &Schema) -> Result<Section> {
    let (&tag, rest) = input
        .split_first()
        .ok_or_else(|| CoreError::truncated("section tag"))?;
    *input = rest;
    let kind = BlobKind::from_section_tag(tag)?;
    let name = read_utf(input)?;
    if name != schema.name() {
        return Err(CoreError::schema_mismatch(format!(
            "section for '{name}', expected '{}'",
            schema.name()
        ))
        .into());
    }
    let (cleared, written) = match kind {
        BlobKind::Snapshot => (OrdinalBitSet::new(), OrdinalBitSet::read_from(input)?),
        BlobKind::Delta | BlobKind::ReverseDelta => (
            OrdinalBitSet::read_from(input)?,
            OrdinalBitSet::read_from(input)?,
        ),
    };
    let rows = decode_columns(input, schema, written.cardinality())?;
    Ok(Section {
        kind,
        cleared,
        written,
        rows,
    })
}

impl Section {
    /// Pair each written ordinal with its decoded row.
    pub fn written_rows(&self) -> impl Iterator<Item = (Ordinal, &RecordRow)> + '_ {
        self.written.iter().zip(self.rows.iter())
    }
}
