//! Loading read states from blob bytes.

use crate::error::Result;
use crate::format::{read_frame_prefix, BlobKind};
use crate::section::read_section;
use hollow_core::{Error as CoreError, SchemaSet};
use hollow_read::{ReadStateEngine, TypeDataBuilder};
use std::sync::Arc;
use tracing::debug;

/// Build a fresh read state engine from snapshot bytes.
///
/// When `expected` is given the embedded schema header must match it
/// exactly; otherwise the embedded schemas define the dataset.
pub fn load_snapshot(bytes: &[u8], expected: Option<&Arc<SchemaSet>>) -> Result<ReadStateEngine> {
    let mut input = bytes;
    let embedded = read_frame_prefix(&mut input)?;
    let schemas = match expected {
        Some(e) => {
            if **e != embedded {
                return Err(CoreError::schema_mismatch(
                    "snapshot schema header differs from the dataset's schemas".to_string(),
                )
                .into());
            }
            e.clone()
        }
        None => Arc::new(embedded),
    };

    let mut types = Vec::with_capacity(schemas.len());
    for schema in schemas.iter() {
        let section = read_section(&mut input, schema)?;
        if section.kind != BlobKind::Snapshot {
            return Err(CoreError::truncated(format!(
                "expected a snapshot section for '{}', found {}",
                schema.name(),
                section.kind
            ))
            .into());
        }
        let mut builder = TypeDataBuilder::new(schema.clone());
        for (ordinal, row) in section.written_rows() {
            builder.set_row(ordinal, row.clone());
        }
        types.push(builder.freeze()?);
    }
    if !input.is_empty() {
        return Err(CoreError::truncated("trailing bytes after final section").into());
    }
    debug!(types = types.len(), "loaded snapshot");
    Ok(ReadStateEngine::new(schemas, types)?)
}

/// Apply a forward or reverse delta to `base`, producing the adjacent
/// read state. The delta's schema header must match `base`.
pub fn apply_delta(base: &ReadStateEngine, bytes: &[u8]) -> Result<ReadStateEngine> {
    let mut input = bytes;
    let embedded = read_frame_prefix(&mut input)?;
    if embedded != **base.schemas() {
        return Err(CoreError::schema_mismatch(
            "delta schema header differs from the base state's schemas".to_string(),
        )
        .into());
    }

    let mut types = Vec::with_capacity(embedded.len());
    let mut blob_kind: Option<BlobKind> = None;
    for (schema, state) in base.schemas().iter().zip(base.type_states()) {
        let section = read_section(&mut input, schema)?;
        match section.kind {
            BlobKind::Delta | BlobKind::ReverseDelta => {}
            BlobKind::Snapshot => {
                return Err(CoreError::truncated(format!(
                    "expected a delta section for '{}', found snapshot",
                    schema.name()
                ))
                .into());
            }
        }
        match blob_kind {
            None => blob_kind = Some(section.kind),
            Some(kind) if kind == section.kind => {}
            Some(kind) => {
                return Err(CoreError::truncated(format!(
                    "mixed section kinds: {kind} then {}",
                    section.kind
                ))
                .into());
            }
        }
        let mut builder = state.to_builder();
        for ordinal in section.cleared.iter() {
            builder.clear_row(ordinal);
        }
        for (ordinal, row) in section.written_rows() {
            builder.set_row(ordinal, row.clone());
        }
        types.push(builder.freeze()?);
    }
    if !input.is_empty() {
        return Err(CoreError::truncated("trailing bytes after final section").into());
    }
    Ok(ReadStateEngine::new(base.schemas().clone(), types)?)
}
