//! Bucket stores.
//!
//! A store is a multiset of `(index, count)` bins. The implementations trade memory against accuracy in different
//! ways:
//!
//! - [`DenseStore`]: contiguous array storage, grows unbounded. Fastest insertion; best when the range of bucket
//!   indices stays bounded.
//! - [`SparseStore`]: ordered map storage. Best for low-volume streams with widely scattered indices.
//! - [`CollapsingLowestDenseStore`]: dense storage capped at a maximum number of bins; collapses lowest-indexed bins
//!   past the cap. Best when higher quantiles (p95, p99) matter most.
//! - [`CollapsingHighestDenseStore`]: dense storage capped at a maximum number of bins; collapses highest-indexed
//!   bins past the cap. Best when lower quantiles (p1, p5) matter most.

use snafu::ensure;

use crate::error::{DeserializationError, NegativeBinCount, NonIntegerBinCount};
use crate::schema::StoreSchema;

mod collapsing_highest;
pub use self::collapsing_highest::CollapsingHighestDenseStore;

mod collapsing_lowest;
pub use self::collapsing_lowest::CollapsingLowestDenseStore;

mod dense;
pub use self::dense::DenseStore;

mod sparse;
pub use self::sparse::SparseStore;

/// A single bucket of a store: an integer index and the count of observations mapped to it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Bin {
    index: i32,
    count: u64,
}

impl Bin {
    /// Creates a new bin.
    pub fn new(index: i32, count: u64) -> Self {
        Self { index, count }
    }

    /// Returns the index of the bin.
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Returns the number of observations within the bin.
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// A one-shot iterator over the bins of a store.
///
/// The iterator holds a snapshot of the store taken when it was created: mutating the store afterwards does not
/// affect an iteration already in progress. Bins are produced in ascending index order, and bins with a zero count
/// are never produced.
#[derive(Debug)]
pub struct Bins {
    inner: std::vec::IntoIter<Bin>,
}

impl Bins {
    pub(crate) fn from_snapshot(bins: Vec<Bin>) -> Self {
        Self { inner: bins.into_iter() }
    }
}

impl Iterator for Bins {
    type Item = Bin;

    fn next(&mut self) -> Option<Bin> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A store of sketch bins.
///
/// Stores only ever hold non-negative counts; counts are unsigned at this interface, and adding a zero count is a
/// no-op, so no bin with a zero stored count can persist through the bin snapshot.
pub trait Store: Clone + Send + Sync {
    /// Adds a single observation to the bin at the given index.
    fn add(&mut self, index: i32) {
        self.add_with_count(index, 1);
    }

    /// Adds a count of observations to the bin at the given index.
    ///
    /// Adding a zero count is a no-op.
    fn add_with_count(&mut self, index: i32, count: u64);

    /// Adds the given bin to the store.
    fn add_bin(&mut self, bin: Bin) {
        self.add_with_count(bin.index(), bin.count());
    }

    /// Returns the total count across all bins.
    fn total_count(&self) -> u64;

    /// Returns `true` if the store holds no observations.
    fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Returns the minimum index with a non-zero count, or `None` if the store is empty.
    fn min_index(&self) -> Option<i32>;

    /// Returns the maximum index with a non-zero count, or `None` if the store is empty.
    fn max_index(&self) -> Option<i32>;

    /// Returns the index of the bin containing the given 0-based rank.
    ///
    /// This is the smallest index whose cumulative count, taken over indices in ascending order, strictly exceeds
    /// `rank`. When `rank` is at or beyond the total count, the maximum index is returned. Returns `None` only when
    /// the store is empty.
    fn key_at_rank(&self, rank: u64) -> Option<i32>;

    /// Merges another store of the same kind into this one.
    ///
    /// Same-kind merging can take a bulk path over the underlying representation; use
    /// [`merge_with`][Self::merge_with] to merge across store kinds.
    fn merge(&mut self, other: &Self);

    /// Merges any other store into this one, bin by bin.
    fn merge_with<O: Store>(&mut self, other: &O) {
        for bin in other.bins() {
            self.add_bin(bin);
        }
    }

    /// Returns a one-shot iterator over a snapshot of the store's bins, in ascending index order.
    fn bins(&self) -> Bins;

    /// Clears all bins from the store.
    fn clear(&mut self);

    /// Converts this store to its serialized form.
    fn to_schema(&self) -> StoreSchema;

    /// Adds every bin of the serialized form into this store.
    ///
    /// Both the sparse and contiguous encodings are accepted, regardless of which one the receiving store would
    /// emit itself.
    ///
    /// # Errors
    ///
    /// If any serialized count is negative or not an integer, an error is returned and the store is left as it was
    /// before the call.
    fn merge_from_schema(&mut self, schema: &StoreSchema) -> Result<(), DeserializationError> {
        for bin in validate_schema_bins(schema)? {
            self.add_bin(bin);
        }
        Ok(())
    }
}

/// Validates a serialized count, converting it to an unsigned integer.
pub(crate) fn validate_schema_count(index: i32, count: f64) -> Result<u64, DeserializationError> {
    ensure!(count >= 0.0, NegativeBinCount { index, count });
    ensure!(count.fract() == 0.0, NonIntegerBinCount { index, count });
    Ok(count as u64)
}

// Validates every serialized bin up front, so a bad count part-way through the schema cannot leave the receiving
// store partially mutated.
fn validate_schema_bins(schema: &StoreSchema) -> Result<Vec<Bin>, DeserializationError> {
    let mut bins = Vec::with_capacity(schema.bin_counts.len() + schema.contiguous_bin_counts.len());

    for (&index, &count) in &schema.bin_counts {
        let count = validate_schema_count(index, count)?;
        if count > 0 {
            bins.push(Bin::new(index, count));
        }
    }

    let offset = schema.contiguous_bin_index_offset;
    for (i, &count) in schema.contiguous_bin_counts.iter().enumerate() {
        let index = offset + i as i32;
        let count = validate_schema_count(index, count)?;
        if count > 0 {
            bins.push(Bin::new(index, count));
        }
    }

    Ok(bins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_schema_count() {
        assert_eq!(validate_schema_count(0, 3.0), Ok(3));
        assert_eq!(validate_schema_count(0, 0.0), Ok(0));
        assert!(matches!(
            validate_schema_count(4, -1.0),
            Err(DeserializationError::NegativeBinCount { index: 4, .. })
        ));
        assert!(matches!(
            validate_schema_count(4, 1.5),
            Err(DeserializationError::NonIntegerBinCount { index: 4, .. })
        ));
    }

    #[test]
    fn test_merge_from_schema_rejects_without_mutating() {
        let mut schema = StoreSchema::default();
        schema.bin_counts.insert(1, 5.0);
        schema.bin_counts.insert(2, -3.0);

        let mut store = DenseStore::new();
        assert!(store.merge_from_schema(&schema).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_cross_kind_merge() {
        let mut sparse = SparseStore::new();
        sparse.add_with_count(-50, 2);
        sparse.add_with_count(75, 3);

        let mut dense = DenseStore::new();
        dense.add_with_count(75, 1);
        dense.merge_with(&sparse);

        assert_eq!(dense.total_count(), 6);
        assert_eq!(dense.min_index(), Some(-50));
        assert_eq!(dense.max_index(), Some(75));
    }
}
