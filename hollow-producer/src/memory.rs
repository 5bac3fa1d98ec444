//! In-memory artifact store and announcer.
//!
//! Backs tests and single-process deployments, and exercises the same
//! trait seams a remote store would: staging is invisible until `publish`.

use crate::api::{Announcer, BlobHandle, BlobRetriever, Publisher};
use crate::error::{Error, Result};
use hollow_blob::{Blob, BlobKind};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

#[derive(Default)]
struct StoreInner {
    next_token: u64,
    staged: FxHashMap<u64, Blob>,
    /// version → snapshot bytes
    snapshots: BTreeMap<u64, Vec<u8>>,
    /// from_version → (to_version, bytes)
    deltas: FxHashMap<u64, (u64, Vec<u8>)>,
    reverse_deltas: FxHashMap<u64, (u64, Vec<u8>)>,
}

/// An in-memory blob store implementing [`Publisher`] and
/// [`BlobRetriever`].
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: Mutex<StoreInner>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of published snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.inner.lock().snapshots.len()
    }

    /// Total published blobs across all kinds.
    pub fn published_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.snapshots.len() + inner.deltas.len() + inner.reverse_deltas.len()
    }
}

impl Publisher for MemoryBlobStore {
    fn stage(&self, blob: &Blob) -> Result<BlobHandle> {
        let mut inner = self.inner.lock();
        inner.next_token += 1;
        let token = inner.next_token;
        inner.staged.insert(token, blob.clone());
        Ok(BlobHandle {
            kind: blob.kind,
            from_version: blob.from_version,
            to_version: blob.to_version,
            token,
        })
    }

    fn publish(&self, handle: &BlobHandle) -> Result<()> {
        let mut inner = self.inner.lock();
        let blob = inner
            .staged
            .remove(&handle.token)
            .ok_or_else(|| Error::publish(format!("unknown staged token {}", handle.token)))?;
        match blob.kind {
            BlobKind::Snapshot => {
                inner.snapshots.insert(blob.to_version, blob.bytes);
            }
            BlobKind::Delta => {
                inner
                    .deltas
                    .insert(blob.from_version, (blob.to_version, blob.bytes));
            }
            BlobKind::ReverseDelta => {
                inner
                    .reverse_deltas
                    .insert(blob.from_version, (blob.to_version, blob.bytes));
            }
        }
        Ok(())
    }
}

impl BlobRetriever for MemoryBlobStore {
    fn retrieve_snapshot(&self, version: u64) -> Result<(u64, Vec<u8>)> {
        let inner = self.inner.lock();
        inner
            .snapshots
            .range(..=version)
            .next_back()
            .map(|(&v, bytes)| (v, bytes.clone()))
            .ok_or_else(|| Error::restore(format!("no snapshot at or below version {version}")))
    }

    fn retrieve_delta(&self, from_version: u64) -> Result<Option<(u64, Vec<u8>)>> {
        Ok(self.inner.lock().deltas.get(&from_version).cloned())
    }

    fn retrieve_reverse_delta(&self, from_version: u64) -> Result<Option<(u64, Vec<u8>)>> {
        Ok(self.inner.lock().reverse_deltas.get(&from_version).cloned())
    }
}

/// An in-memory announcement endpoint.
#[derive(Default)]
pub struct MemoryAnnouncer {
    latest: Mutex<Option<u64>>,
}

impl MemoryAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently announced version.
    pub fn announced_version(&self) -> Option<u64> {
        *self.latest.lock()
    }
}

impl Announcer for MemoryAnnouncer {
    fn announce(&self, version: u64) -> Result<()> {
        *self.latest.lock() = Some(version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(kind: BlobKind, from: u64, to: u64) -> Blob {
        Blob::new(kind, from, to, vec![kind.section_tag()])
    }

    #[test]
    fn staged_blobs_are_invisible_until_published() {
        let store = MemoryBlobStore::new();
        let handle = store.stage(&blob(BlobKind::Snapshot, 0, 5)).unwrap();
        assert!(store.retrieve_snapshot(5).is_err());
        store.publish(&handle).unwrap();
        let (v, bytes) = store.retrieve_snapshot(5).unwrap();
        assert_eq!(v, 5);
        assert_eq!(bytes, vec![BlobKind::Snapshot.section_tag()]);
    }

    #[test]
    fn snapshot_lookup_is_floor() {
        let store = MemoryBlobStore::new();
        for v in [2u64, 5, 9] {
            let h = store.stage(&blob(BlobKind::Snapshot, 0, v)).unwrap();
            store.publish(&h).unwrap();
        }
        assert_eq!(store.retrieve_snapshot(7).unwrap().0, 5);
        assert_eq!(store.retrieve_snapshot(9).unwrap().0, 9);
        assert!(store.retrieve_snapshot(1).is_err());
    }

    #[test]
    fn deltas_key_on_from_version() {
        let store = MemoryBlobStore::new();
        let h = store.stage(&blob(BlobKind::Delta, 3, 4)).unwrap();
        store.publish(&h).unwrap();
        assert_eq!(store.retrieve_delta(3).unwrap().unwrap().0, 4);
        assert!(store.retrieve_delta(4).unwrap().is_none());
    }

    #[test]
    fn publish_of_unknown_token_fails() {
        let store = MemoryBlobStore::new();
        let handle = BlobHandle {
            kind: BlobKind::Snapshot,
            from_version: 0,
            to_version: 1,
            token: 99,
        };
        assert!(store.publish(&handle).is_err());
    }

    #[test]
    fn announcer_tracks_latest() {
        let announcer = MemoryAnnouncer::new();
        assert_eq!(announcer.announced_version(), None);
        announcer.announce(3).unwrap();
        announcer.announce(7).unwrap();
        assert_eq!(announcer.announced_version(), Some(7));
    }
}
