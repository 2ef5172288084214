use std::collections::BTreeMap;

use super::{Bin, Bins, Store};
use crate::schema::StoreSchema;

/// A sparse store backed by an ordered map.
///
/// Only non-empty bins are stored, so memory usage tracks the number of distinct bucket indices rather than their
/// span. The ordered map keeps indices sorted, which makes rank queries and extrema lookups straightforward without
/// any separate min/max bookkeeping. There is no bound on the number of bins.
///
/// Use this store for low-cardinality or low-volume streams where a dense array would be mostly empty.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SparseStore {
    /// The bin counts, keyed by index.
    bins: BTreeMap<i32, u64>,

    /// Total count across all bins.
    count: u64,
}

impl SparseStore {
    /// Creates an empty `SparseStore`.
    pub fn new() -> Self {
        Self {
            bins: BTreeMap::new(),
            count: 0,
        }
    }
}

impl Store for SparseStore {
    fn add_with_count(&mut self, index: i32, count: u64) {
        if count == 0 {
            return;
        }

        *self.bins.entry(index).or_insert(0) += count;
        self.count = self.count.saturating_add(count);
    }

    fn total_count(&self) -> u64 {
        self.count
    }

    fn min_index(&self) -> Option<i32> {
        self.bins.keys().next().copied()
    }

    fn max_index(&self) -> Option<i32> {
        self.bins.keys().next_back().copied()
    }

    fn key_at_rank(&self, rank: u64) -> Option<i32> {
        let mut cumulative = 0u64;
        for (&index, &count) in &self.bins {
            cumulative += count;
            if cumulative > rank {
                return Some(index);
            }
        }

        self.max_index()
    }

    fn merge(&mut self, other: &Self) {
        for (&index, &count) in &other.bins {
            *self.bins.entry(index).or_insert(0) += count;
        }
        self.count = self.count.saturating_add(other.count);
    }

    fn bins(&self) -> Bins {
        let snapshot = self.bins.iter().map(|(&index, &count)| Bin::new(index, count)).collect();
        Bins::from_snapshot(snapshot)
    }

    fn clear(&mut self) {
        self.bins.clear();
        self.count = 0;
    }

    fn to_schema(&self) -> StoreSchema {
        StoreSchema {
            bin_counts: self.bins.iter().map(|(&index, &count)| (index, count as f64)).collect(),
            ..Default::default()
        }
    }
}

impl Default for SparseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_widely_scattered() {
        let mut store = SparseStore::new();
        store.add_with_count(-1000, 1);
        store.add_with_count(0, 2);
        store.add_with_count(1000, 3);

        assert_eq!(store.total_count(), 6);
        assert_eq!(store.min_index(), Some(-1000));
        assert_eq!(store.max_index(), Some(1000));
        // Only three bins exist, not 2001.
        assert_eq!(store.bins().count(), 3);
    }

    #[test]
    fn test_key_at_rank() {
        let mut store = SparseStore::new();
        store.add_with_count(-10, 2);
        store.add_with_count(10, 3);

        assert_eq!(store.key_at_rank(0), Some(-10));
        assert_eq!(store.key_at_rank(1), Some(-10));
        assert_eq!(store.key_at_rank(2), Some(10));
        assert_eq!(store.key_at_rank(4), Some(10));
        assert_eq!(store.key_at_rank(5), Some(10));
    }

    #[test]
    fn test_merge() {
        let mut store1 = SparseStore::new();
        store1.add_with_count(5, 2);

        let mut store2 = SparseStore::new();
        store2.add_with_count(5, 3);
        store2.add_with_count(100, 1);

        store1.merge(&store2);

        assert_eq!(store1.total_count(), 6);
        let bins: Vec<_> = store1.bins().collect();
        assert_eq!(bins, vec![Bin::new(5, 5), Bin::new(100, 1)]);
    }

    #[test]
    fn test_schema_uses_sparse_encoding() {
        let mut store = SparseStore::new();
        store.add_with_count(-3, 1);
        store.add_with_count(40, 2);

        let schema = store.to_schema();
        assert!(schema.contiguous_bin_counts.is_empty());
        assert_eq!(schema.bin_counts.get(&-3), Some(&1.0));
        assert_eq!(schema.bin_counts.get(&40), Some(&2.0));

        let mut reconstructed = SparseStore::new();
        reconstructed.merge_from_schema(&schema).unwrap();
        assert_eq!(store, reconstructed);
    }
}
