//! Snapshot and delta computation for one cycle.
//!
//! The write state freezes into the candidate read state; the blobs encode
//! the same rows. Per type, with `P` the prior populated set and `C` the
//! cycle's populated set: `added = C \ P`, `removed = P \ C`, and the
//! write engine's `modified` set (keyed re-adds with changed content). The
//! forward delta clears `removed ∪ modified` and writes `added ∪
//! modified`; the reverse delta is symmetric with the prior payloads.
//!
//! On a new delta chain (no prior state) the delta blobs are structurally
//! empty: one section per type with empty cleared and written sets.

use crate::columns::{column_maxes, ColumnMaxes};
use crate::error::Result;
use crate::format::{write_frame_prefix, Blob, BlobKind};
use crate::section::{write_delta_section, write_snapshot_section};
use hollow_core::schema::ResolvedKeyPath;
use hollow_core::{
    fnv1a64, hash_ordinal, mix, Error as CoreError, FieldValue, HashKey, Ordinal, OrdinalBitSet,
    Schema, WriteRecord,
};
use hollow_read::{freeze_engine, MapTable, ReadStateEngine, RecordRow, SetTable, TypeDataBuilder};
use hollow_write::WriteStateEngine;
use tracing::debug;

/// Everything one publish stage produces.
pub struct CycleArtifacts {
    pub snapshot: Blob,
    pub delta: Blob,
    pub reverse_delta: Blob,
    /// The canonical freeze of the write state; promoted on announce.
    pub candidate: ReadStateEngine,
}

/// Compute the cycle's three blobs and its candidate read state.
pub fn compute_cycle_blobs(
    write: &WriteStateEngine,
    prev: Option<&ReadStateEngine>,
    from_version: u64,
    to_version: u64,
) -> Result<CycleArtifacts> {
    let schemas = write.schemas().clone();
    let builders = builders_from_write(write)?;
    let candidate = freeze_engine(schemas.clone(), &builders)?;

    // snapshot
    let mut snapshot_bytes = Vec::new();
    write_frame_prefix(&mut snapshot_bytes, &schemas);
    for (schema, builder) in schemas.iter().zip(builders.iter()) {
        let populated = builder.populated().clone();
        let rows: Vec<&RecordRow> = populated
            .iter()
            .map(|o| builder.row(o).expect("populated row"))
            .collect();
        let maxes = column_maxes(schema, rows.iter().copied());
        write_snapshot_section(&mut snapshot_bytes, schema, &populated, &rows, &maxes)?;
    }

    // forward and reverse deltas
    let mut delta_bytes = Vec::new();
    let mut reverse_bytes = Vec::new();
    write_frame_prefix(&mut delta_bytes, &schemas);
    write_frame_prefix(&mut reverse_bytes, &schemas);

    for (idx, schema) in schemas.iter().enumerate() {
        let wstate = write.type_state(schema.name())?;
        let empty = OrdinalBitSet::new();
        let (fwd_cleared, fwd_written, rev_cleared, rev_written, prev_state) = match prev {
            None => (empty.clone(), empty.clone(), empty.clone(), empty, None),
            Some(prev_engine) => {
                let prev_state = prev_engine
                    .type_state(schema.name())
                    .expect("schema sets match");
                let prev_populated = prev_state.populated_ordinals();
                let current = wstate.current();
                // a modified-then-removed ordinal is plain removal
                let modified = wstate.modified().intersection(current);
                let added = current.difference(prev_populated);
                let removed = prev_populated.difference(current);
                (
                    removed.union(&modified),
                    added.union(&modified),
                    added.union(&modified),
                    removed.union(&modified),
                    Some(prev_state),
                )
            }
        };

        let fwd_rows: Vec<&RecordRow> = fwd_written
            .iter()
            .map(|o| builders[idx].row(o).expect("written rows are populated"))
            .collect();
        let rev_row_values: Vec<RecordRow> = rev_written
            .iter()
            .map(|o| {
                prev_state
                    .and_then(|s| s.decode_row(o))
                    .expect("reverse rows are populated in the prior state")
            })
            .collect();
        let rev_rows: Vec<&RecordRow> = rev_row_values.iter().collect();

        let maxes: ColumnMaxes = column_maxes(schema, fwd_rows.iter().copied())
            .merge(&column_maxes(schema, rev_rows.iter().copied()));

        write_delta_section(
            &mut delta_bytes,
            BlobKind::Delta,
            schema,
            &fwd_cleared,
            &fwd_written,
            &fwd_rows,
            &maxes,
        )?;
        write_delta_section(
            &mut reverse_bytes,
            BlobKind::ReverseDelta,
            schema,
            &rev_cleared,
            &rev_written,
            &rev_rows,
            &maxes,
        )?;
    }

    debug!(
        from_version,
        to_version,
        snapshot_bytes = snapshot_bytes.len(),
        delta_bytes = delta_bytes.len(),
        "computed cycle blobs"
    );
    Ok(CycleArtifacts {
        snapshot: Blob::new(BlobKind::Snapshot, 0, to_version, snapshot_bytes),
        delta: Blob::new(BlobKind::Delta, from_version, to_version, delta_bytes),
        reverse_delta: Blob::new(BlobKind::ReverseDelta, to_version, from_version, reverse_bytes),
        candidate,
    })
}

/// How a set's elements (or a map's keys) land in bucket slots.
enum HashPlan {
    /// Hash the element/key ordinal itself.
    Ordinal,
    /// Hash the projection of the hashed type's key paths.
    Fields(String, Vec<ResolvedKeyPath>),
}

impl HashPlan {
    fn resolve(
        schemas: &hollow_core::SchemaSet,
        hashed_type: &str,
        key: &Option<HashKey>,
    ) -> Result<Self> {
        match key {
            None | Some(HashKey::Ordinal) => Ok(HashPlan::Ordinal),
            Some(HashKey::Fields(k)) => {
                let mut paths = Vec::with_capacity(k.field_paths.len());
                for path in &k.field_paths {
                    paths.push(schemas.resolve_path(hashed_type, path)?);
                }
                Ok(HashPlan::Fields(hashed_type.to_string(), paths))
            }
        }
    }

    fn bucket_hash(&self, write: &WriteStateEngine, ordinal: Ordinal) -> Result<u64> {
        match self {
            HashPlan::Ordinal => Ok(hash_ordinal(ordinal)),
            HashPlan::Fields(hashed_type, paths) => {
                let mut values = Vec::with_capacity(paths.len());
                for path in paths {
                    values.push(project_write_value(write, hashed_type, ordinal, path)?);
                }
                let bytes = WriteRecord::Object(values).canonical_bytes();
                Ok(mix(fnv1a64(&bytes)))
            }
        }
    }
}

/// Read one leaf value from the write arenas along a resolved key path.
fn project_write_value(
    write: &WriteStateEngine,
    start_type: &str,
    ordinal: Ordinal,
    path: &ResolvedKeyPath,
) -> Result<FieldValue> {
    let mut type_name = start_type.to_string();
    let mut current = write
        .type_state(&type_name)?
        .record(ordinal)
        .ok_or_else(|| {
            CoreError::invalid_record(format!(
                "hash key references missing ordinal {ordinal} in '{type_name}'"
            ))
        })?
        .clone();
    for (depth, &step) in path.steps.iter().enumerate() {
        let WriteRecord::Object(values) = &current else {
            return Err(CoreError::invalid_record(format!(
                "hash key path traverses non-object record in '{type_name}'"
            ))
            .into());
        };
        let value = values[step].clone();
        if depth == path.steps.len() - 1 {
            return Ok(value);
        }
        match value {
            FieldValue::Ref(Some(child)) => {
                type_name = path.types[depth + 1].clone();
                current = write
                    .type_state(&type_name)?
                    .record(child)
                    .ok_or_else(|| {
                        CoreError::invalid_record(format!(
                            "hash key references missing ordinal {child} in '{type_name}'"
                        ))
                    })?
                    .clone();
            }
            FieldValue::Ref(None) | FieldValue::Null => return Ok(FieldValue::Null),
            _ => {
                return Err(CoreError::invalid_record(
                    "hash key path step is not a reference".to_string(),
                )
                .into())
            }
        }
    }
    unreachable!("key paths have at least one step")
}

/// Convert the write state's current records into per-type builders,
/// placing set/map entries into their bucket tables.
pub fn builders_from_write(write: &WriteStateEngine) -> Result<Vec<TypeDataBuilder>> {
    let schemas = write.schemas();
    let mut builders = Vec::with_capacity(schemas.len());
    for (schema, state) in write.type_states() {
        let plan = match schema {
            Schema::Set(s) => Some(HashPlan::resolve(schemas, &s.element_type, &s.hash_key)?),
            Schema::Map(m) => Some(HashPlan::resolve(schemas, &m.key_type, &m.hash_key)?),
            _ => None,
        };
        let mut builder = TypeDataBuilder::new(schema.clone());
        for ordinal in state.current().iter() {
            let record = state.record(ordinal).ok_or_else(|| {
                CoreError::invalid_record(format!(
                    "populated ordinal {ordinal} has no staged record in '{}'",
                    schema.name()
                ))
            })?;
            let row = match record {
                WriteRecord::Object(values) => RecordRow::Object(values.clone()),
                WriteRecord::List(elements) => RecordRow::List(elements.clone()),
                WriteRecord::Set(elements) => {
                    let plan = plan.as_ref().expect("set types carry a hash plan");
                    let mut entries = Vec::with_capacity(elements.len());
                    for &e in elements {
                        entries.push((e, plan.bucket_hash(write, e)?));
                    }
                    RecordRow::Set(SetTable::build(&entries))
                }
                WriteRecord::Map(map_entries) => {
                    let plan = plan.as_ref().expect("map types carry a hash plan");
                    let mut entries = Vec::with_capacity(map_entries.len());
                    for &(k, v) in map_entries {
                        entries.push((k, v, plan.bucket_hash(write, k)?));
                    }
                    RecordRow::Map(MapTable::build(&entries))
                }
            };
            builder.set_row(ordinal, row);
        }
        builders.push(builder);
    }
    Ok(builders)
}
