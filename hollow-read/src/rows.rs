//! Decoded record rows.
//!
//! [`RecordRow`] is the value-level form of one record: what the builder
//! stages before a freeze and what `decode_row` recovers from packed
//! columns. Set and map rows keep their bucket layout, so a row decoded
//! from one state re-freezes to an identical table without re-hashing.

use hollow_core::{FieldValue, Ordinal};

/// A power-of-two open-addressed bucket table of element ordinals.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SetTable {
    pub buckets: Vec<Option<Ordinal>>,
}

impl SetTable {
    /// Place `entries` (`(element ordinal, bucket hash)`) with linear
    /// probing. Table size keeps load below 0.7.
    pub fn build(entries: &[(Ordinal, u64)]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }
        let size = table_size(entries.len());
        let mask = size - 1;
        let mut buckets = vec![None; size];
        for &(ordinal, hash) in entries {
            let mut slot = hash as usize & mask;
            while buckets[slot].is_some() {
                slot = (slot + 1) & mask;
            }
            buckets[slot] = Some(ordinal);
        }
        Self { buckets }
    }

    /// Element ordinals in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = Ordinal> + '_ {
        self.buckets.iter().filter_map(|b| *b)
    }

    /// Number of placed elements.
    pub fn len(&self) -> usize {
        self.buckets.iter().filter(|b| b.is_some()).count()
    }

    /// True when no element is placed.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.is_none())
    }
}

/// A bucket table of key/value ordinal pairs, keyed on the key's hash.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct MapTable {
    pub buckets: Vec<Option<(Ordinal, Ordinal)>>,
}

impl MapTable {
    /// Place `entries` (`(key, value, key bucket hash)`) with linear
    /// probing.
    pub fn build(entries: &[(Ordinal, Ordinal, u64)]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }
        let size = table_size(entries.len());
        let mask = size - 1;
        let mut buckets = vec![None; size];
        for &(key, value, hash) in entries {
            let mut slot = hash as usize & mask;
            while buckets[slot].is_some() {
                slot = (slot + 1) & mask;
            }
            buckets[slot] = Some((key, value));
        }
        Self { buckets }
    }

    /// Key/value pairs in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (Ordinal, Ordinal)> + '_ {
        self.buckets.iter().filter_map(|b| *b)
    }

    /// Number of placed entries.
    pub fn len(&self) -> usize {
        self.buckets.iter().filter(|b| b.is_some()).count()
    }

    /// True when no entry is placed.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.is_none())
    }
}

/// Smallest power-of-two table keeping load factor below 0.7.
fn table_size(entries: usize) -> usize {
    (entries * 10 / 7 + 1).next_power_of_two()
}

/// The decoded payload of one record.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordRow {
    /// One value per field, in schema field order.
    Object(Vec<FieldValue>),
    /// Ordered element ordinals.
    List(Vec<Ordinal>),
    Set(SetTable),
    Map(MapTable),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_size_keeps_headroom() {
        assert_eq!(table_size(1), 2);
        assert_eq!(table_size(3), 8);
        assert_eq!(table_size(7), 16);
        assert!(table_size(100) >= 128);
    }

    #[test]
    fn set_table_places_all_entries() {
        let entries: Vec<(Ordinal, u64)> = (0..20).map(|o| (o, (o as u64) * 17)).collect();
        let table = SetTable::build(&entries);
        assert_eq!(table.len(), 20);
        let mut seen: Vec<Ordinal> = table.iter().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn colliding_hashes_probe_linearly() {
        // same hash for all entries: every element must still land
        let entries: Vec<(Ordinal, u64)> = (0..5).map(|o| (o, 42)).collect();
        let table = SetTable::build(&entries);
        assert_eq!(table.len(), 5);
        // first entry sits at the home slot
        let mask = table.buckets.len() - 1;
        assert_eq!(table.buckets[42 & mask], Some(0));
    }

    #[test]
    fn map_table_pairs_survive() {
        let entries = vec![(1u32, 10u32, 7u64), (2, 20, 7), (3, 30, 8)];
        let table = MapTable::build(&entries);
        let mut pairs: Vec<_> = table.iter().collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(1, 10), (2, 20), (3, 30)]);
    }

    #[test]
    fn empty_tables_have_no_buckets() {
        assert!(SetTable::build(&[]).buckets.is_empty());
        assert!(MapTable::build(&[]).buckets.is_empty());
    }
}
