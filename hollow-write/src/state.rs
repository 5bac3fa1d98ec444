//! Per-type staging state.
//!
//! Each type owns a slab arena keyed by dense ordinal, dedup indexes, and
//! the cycle-lifecycle bitsets. Mutation goes through
//! [`WriteStateEngine`](crate::WriteStateEngine), which owns cross-type
//! concerns (reference checks, key projection).

use hollow_core::{OrdinalBitSet, Ordinal, WriteRecord};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// A staged record plus its identity hashes.
#[derive(Clone, Debug)]
pub struct StoredRecord {
    pub record: WriteRecord,
    /// FNV-1a over the canonical record bytes.
    pub content_hash: u64,
    /// Canonical bytes of the projected primary key, for keyed types.
    pub key_bytes: Option<Vec<u8>>,
}

/// Dedup chains: hash → candidate ordinals. Collisions resolve by byte
/// comparison in the engine.
pub(crate) type DedupIndex = FxHashMap<u64, SmallVec<[Ordinal; 1]>>;

/// The write-side state of one type.
#[derive(Debug, Default)]
pub struct TypeWriteState {
    pub(crate) records: Vec<Option<StoredRecord>>,
    /// content hash → ordinals (types without a primary key)
    pub(crate) by_content: DedupIndex,
    /// primary-key hash → ordinals (keyed types)
    pub(crate) by_key: DedupIndex,
    /// ordinals added this cycle
    pub(crate) current: OrdinalBitSet,
    /// ordinals populated in the last announced cycle
    pub(crate) previous: OrdinalBitSet,
    /// populated in the prior cycle, not re-added; addressable until the
    /// next rollover
    pub(crate) ghosts: OrdinalBitSet,
    /// keyed records re-added this cycle with changed content
    pub(crate) modified: OrdinalBitSet,
    /// in-place replacements journalled for failure rollback
    pub(crate) replaced: Vec<(Ordinal, StoredRecord)>,
    pub(crate) freelist: Vec<Ordinal>,
    pub(crate) next_ordinal: Ordinal,
}

impl TypeWriteState {
    /// The record stored at `ordinal`, live or ghost.
    pub fn record(&self, ordinal: Ordinal) -> Option<&WriteRecord> {
        self.records
            .get(ordinal as usize)
            .and_then(|slot| slot.as_ref())
            .map(|stored| &stored.record)
    }

    pub(crate) fn stored(&self, ordinal: Ordinal) -> Option<&StoredRecord> {
        self.records
            .get(ordinal as usize)
            .and_then(|slot| slot.as_ref())
    }

    /// Ordinals added this cycle.
    pub fn current(&self) -> &OrdinalBitSet {
        &self.current
    }

    /// Ordinals populated in the last announced cycle.
    pub fn previous(&self) -> &OrdinalBitSet {
        &self.previous
    }

    /// Ghost ordinals from the prior cycle.
    pub fn ghosts(&self) -> &OrdinalBitSet {
        &self.ghosts
    }

    /// Keyed ordinals whose content changed this cycle.
    pub fn modified(&self) -> &OrdinalBitSet {
        &self.modified
    }

    /// One past the highest ordinal ever assigned.
    pub fn next_ordinal(&self) -> Ordinal {
        self.next_ordinal
    }

    /// True when this cycle changed the type's populated set or content.
    pub fn has_changes(&self) -> bool {
        self.current != self.previous || !self.modified.is_empty()
    }

    pub(crate) fn allocate(&mut self) -> Ordinal {
        let ordinal = self.freelist.pop().unwrap_or_else(|| {
            let o = self.next_ordinal;
            self.next_ordinal += 1;
            o
        });
        if self.records.len() <= ordinal as usize {
            self.records.resize_with(ordinal as usize + 1, || None);
        }
        ordinal
    }

    pub(crate) fn store(&mut self, ordinal: Ordinal, stored: StoredRecord) {
        let keyed = stored.key_bytes.is_some();
        if keyed {
            self.by_key.entry(stored.content_hash_for_index()).or_default().push(ordinal);
        } else {
            self.by_content.entry(stored.content_hash).or_default().push(ordinal);
        }
        self.records[ordinal as usize] = Some(stored);
    }

    pub(crate) fn evict(&mut self, ordinal: Ordinal) {
        let Some(stored) = self.records[ordinal as usize].take() else {
            return;
        };
        let (index, hash) = if stored.key_bytes.is_some() {
            (&mut self.by_key, stored.content_hash_for_index())
        } else {
            (&mut self.by_content, stored.content_hash)
        };
        if let Some(chain) = index.get_mut(&hash) {
            chain.retain(|o| *o != ordinal);
            if chain.is_empty() {
                index.remove(&hash);
            }
        }
    }
}

impl StoredRecord {
    /// The hash the record is indexed under: the primary-key hash for
    /// keyed types, the content hash otherwise.
    pub(crate) fn content_hash_for_index(&self) -> u64 {
        match &self.key_bytes {
            Some(key) => hollow_core::fnv1a64(key),
            None => self.content_hash,
        }
    }
}
