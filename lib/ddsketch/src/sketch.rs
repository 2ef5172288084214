//! The sketch.

use snafu::ensure;

use crate::error::{
    DeserializationError, EmptySketch, IncompatibleMappings, InvalidQuantile, NegativeZeroCount, NonIntegerZeroCount,
    SketchError, ValueOutOfRange,
};
use crate::mapping::{IndexMapping, LogarithmicMapping};
use crate::schema::SketchSchema;
use crate::store::{Bins, CollapsingHighestDenseStore, CollapsingLowestDenseStore, DenseStore, Store};

/// A fast and fully-mergeable quantile sketch with relative-error guarantees.
///
/// A `DDSketch` accepts a stream of non-negative values and answers quantile queries over it: for any quantile, the
/// returned value is within `relative_accuracy` of the true value at that rank, as long as the true value is above
/// the mapping's minimum indexable threshold. Values at or below that threshold are tracked exactly as zeros.
///
/// The sketch composes one index mapping with one bucket store; the mapping decides which bucket a value falls into
/// and the store holds the bucket counts. Sketches built over the same mapping configuration can be merged without
/// losing any accuracy, which makes the type suitable for distributed aggregation: producers each maintain their own
/// sketch and a single aggregator folds them together.
///
/// A sketch is not safe for concurrent mutation; an aggregator merging results from multiple producers must own the
/// accumulation sketch or guard it with an external lock.
///
/// # Example
///
/// ```
/// use ddsketch::DDSketch;
///
/// let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
/// for i in 1..=100 {
///     sketch.add(i as f64).unwrap();
/// }
///
/// let median = sketch.quantile(0.5).unwrap();
/// assert!((median - 50.0).abs() / 50.0 <= 0.01);
/// ```
#[derive(Clone, Debug)]
pub struct DDSketch<M: IndexMapping = LogarithmicMapping, S: Store = DenseStore> {
    /// The index mapping for this sketch.
    mapping: M,

    /// Store for indexed values.
    store: S,

    /// Count of values treated as exact zero.
    zero_count: u64,
}

impl DDSketch<LogarithmicMapping, DenseStore> {
    /// Creates a new `DDSketch` with the given relative accuracy.
    ///
    /// Uses a logarithmic mapping over an unbounded dense store: constant-time insertion, with memory growing to
    /// accommodate the range of inserted values.
    ///
    /// # Errors
    ///
    /// If the relative accuracy is not between 0 and 1 (exclusive), an error is returned.
    pub fn with_relative_accuracy(relative_accuracy: f64) -> Result<Self, SketchError> {
        let mapping = LogarithmicMapping::new(relative_accuracy)?;
        Ok(Self::new(mapping, DenseStore::new()))
    }
}

impl DDSketch<LogarithmicMapping, CollapsingLowestDenseStore> {
    /// Creates a new `DDSketch` with the given relative accuracy and a hard limit on the number of bins.
    ///
    /// Uses a logarithmic mapping over a dense store that collapses its lowest bins once `max_num_bins` is reached,
    /// trading accuracy at the lower quantiles for a fixed memory ceiling.
    ///
    /// # Errors
    ///
    /// If the relative accuracy is not between 0 and 1 (exclusive), an error is returned.
    pub fn log_collapsing_lowest(relative_accuracy: f64, max_num_bins: usize) -> Result<Self, SketchError> {
        let mapping = LogarithmicMapping::new(relative_accuracy)?;
        Ok(Self::new(mapping, CollapsingLowestDenseStore::new(max_num_bins)))
    }
}

impl DDSketch<LogarithmicMapping, CollapsingHighestDenseStore> {
    /// Creates a new `DDSketch` with the given relative accuracy and a hard limit on the number of bins.
    ///
    /// Uses a logarithmic mapping over a dense store that collapses its highest bins once `max_num_bins` is reached,
    /// trading accuracy at the higher quantiles for a fixed memory ceiling.
    ///
    /// # Errors
    ///
    /// If the relative accuracy is not between 0 and 1 (exclusive), an error is returned.
    pub fn log_collapsing_highest(relative_accuracy: f64, max_num_bins: usize) -> Result<Self, SketchError> {
        let mapping = LogarithmicMapping::new(relative_accuracy)?;
        Ok(Self::new(mapping, CollapsingHighestDenseStore::new(max_num_bins)))
    }
}

impl<M: IndexMapping, S: Store> DDSketch<M, S> {
    /// Creates a new `DDSketch` from an explicit mapping and store.
    pub fn new(mapping: M, store: S) -> Self {
        Self {
            mapping,
            store,
            zero_count: 0,
        }
    }

    /// Adds a single value to the sketch.
    ///
    /// # Errors
    ///
    /// If the value is negative or exceeds the mapping's maximum indexable value, an error is returned and the
    /// sketch is left unchanged.
    pub fn add(&mut self, value: f64) -> Result<(), SketchError> {
        self.add_with_count(value, 1)
    }

    /// Adds a value to the sketch with the given count.
    ///
    /// This is useful for weighted values or pre-aggregated data. Adding a zero count is a no-op.
    ///
    /// # Errors
    ///
    /// If the value is negative or exceeds the mapping's maximum indexable value, an error is returned and the
    /// sketch is left unchanged.
    pub fn add_with_count(&mut self, value: f64, count: u64) -> Result<(), SketchError> {
        ensure!(
            value >= 0.0 && value <= self.mapping.max_indexable_value(),
            ValueOutOfRange { value }
        );

        if value > self.mapping.min_indexable_value() {
            self.store.add_with_count(self.mapping.index(value), count);
        } else {
            // Too small to index safely: tracked as an exact zero.
            self.zero_count = self.zero_count.saturating_add(count);
        }
        Ok(())
    }

    /// Returns the approximate value at the given quantile.
    ///
    /// The returned value is the reconstructed value of the bucket holding the observation at rank
    /// `q * (count - 1)` of the conceptually sorted stream, which reproduces the conventional nearest-rank quantile
    /// without materializing the stream.
    ///
    /// # Errors
    ///
    /// If the quantile is outside of `[0, 1]`, or the sketch is empty, an error is returned.
    pub fn quantile(&self, q: f64) -> Result<f64, SketchError> {
        ensure!((0.0..=1.0).contains(&q), InvalidQuantile { quantile: q });

        let count = self.count();
        ensure!(count > 0, EmptySketch);

        let rank = q * (count - 1) as f64;
        if rank < self.zero_count as f64 {
            return Ok(0.0);
        }

        match self.store.key_at_rank(rank as u64 - self.zero_count) {
            Some(index) => Ok(self.mapping.value(index)),
            None => unreachable!("rank within bounds on a non-empty store"),
        }
    }

    /// Returns the approximate values at the given quantiles.
    ///
    /// # Errors
    ///
    /// If any quantile is outside of `[0, 1]`, or the sketch is empty, the first error is returned.
    pub fn quantiles(&self, quantiles: &[f64]) -> Result<Vec<f64>, SketchError> {
        quantiles.iter().map(|&q| self.quantile(q)).collect()
    }

    /// Returns the total number of values added to the sketch.
    pub fn count(&self) -> u64 {
        self.zero_count.saturating_add(self.store.total_count())
    }

    /// Returns `true` if no value has been added to the sketch.
    pub fn is_empty(&self) -> bool {
        self.zero_count == 0 && self.store.is_empty()
    }

    /// Returns the approximate minimum value added to the sketch.
    ///
    /// Zero values, when present, are always the minimum.
    ///
    /// # Errors
    ///
    /// If the sketch is empty, an error is returned.
    pub fn min_value(&self) -> Result<f64, SketchError> {
        if self.zero_count > 0 {
            return Ok(0.0);
        }

        match self.store.min_index() {
            Some(index) => Ok(self.mapping.value(index)),
            None => EmptySketch.fail(),
        }
    }

    /// Returns the approximate maximum value added to the sketch.
    ///
    /// # Errors
    ///
    /// If the sketch is empty, an error is returned.
    pub fn max_value(&self) -> Result<f64, SketchError> {
        match self.store.max_index() {
            Some(index) => Ok(self.mapping.value(index)),
            None if self.zero_count > 0 => Ok(0.0),
            None => EmptySketch.fail(),
        }
    }

    /// Merges another sketch into this one.
    ///
    /// After this operation, this sketch encodes all values that were added to either sketch. Merging never loses
    /// accuracy beyond what each sketch already carries, so partial sketches built by independent producers over the
    /// same mapping configuration combine into an exact union.
    ///
    /// # Errors
    ///
    /// If the two sketches do not use equal index mappings, an error is returned and this sketch is left unchanged.
    pub fn merge(&mut self, other: &Self) -> Result<(), SketchError> {
        ensure!(self.mapping == other.mapping, IncompatibleMappings);

        self.store.merge(&other.store);
        self.zero_count = self.zero_count.saturating_add(other.zero_count);
        Ok(())
    }

    /// Returns a one-shot iterator over a snapshot of the sketch's bins, in ascending index order.
    ///
    /// The count of values treated as zero is not part of the bin sequence; see [`zero_count`][Self::zero_count].
    pub fn bins(&self) -> Bins {
        self.store.bins()
    }

    /// Clears the sketch, removing all values.
    pub fn clear(&mut self) {
        self.store.clear();
        self.zero_count = 0;
    }

    /// Returns a reference to the index mapping.
    pub fn mapping(&self) -> &M {
        &self.mapping
    }

    /// Returns a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the count of values treated as exact zero.
    pub fn zero_count(&self) -> u64 {
        self.zero_count
    }

    /// Returns the relative accuracy of this sketch.
    pub fn relative_accuracy(&self) -> f64 {
        self.mapping.relative_accuracy()
    }

    /// Converts this sketch to its serialized form.
    pub fn to_schema(&self) -> SketchSchema {
        SketchSchema {
            mapping: self.mapping.to_schema(),
            store: self.store.to_schema(),
            zero_count: self.zero_count as f64,
        }
    }

    /// Creates a `DDSketch` from its serialized form, validating it against the given mapping.
    ///
    /// The provided mapping instance becomes the mapping of the reconstructed sketch; its own configuration is never
    /// modified by deserialization. The store is rebuilt from its `Default` configuration and repopulated bin by bin,
    /// so a bounded store applies its own configured bin limit, re-collapsing if the serialized bins exceed it.
    ///
    /// # Errors
    ///
    /// If the serialized mapping parameters do not match the provided mapping, or any serialized count is negative
    /// or not an integer, an error is returned.
    pub fn from_schema(schema: &SketchSchema, mapping: M) -> Result<Self, DeserializationError>
    where
        S: Default,
    {
        mapping.validate_schema(&schema.mapping)?;

        ensure!(
            schema.zero_count >= 0.0,
            NegativeZeroCount {
                count: schema.zero_count
            }
        );
        ensure!(
            schema.zero_count.fract() == 0.0,
            NonIntegerZeroCount {
                count: schema.zero_count
            }
        );
        let zero_count = schema.zero_count as u64;

        let mut store = S::default();
        store.merge_from_schema(&schema.store)?;

        Ok(Self {
            mapping,
            store,
            zero_count,
        })
    }
}

impl<M: IndexMapping, S: Store + PartialEq> PartialEq for DDSketch<M, S> {
    fn eq(&self, other: &Self) -> bool {
        self.mapping == other.mapping && self.store == other.store && self.zero_count == other.zero_count
    }
}

impl<M: IndexMapping + Default, S: Store + Default> Default for DDSketch<M, S> {
    fn default() -> Self {
        Self::new(M::default(), S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::LinearlyInterpolatedMapping;
    use crate::store::SparseStore;

    macro_rules! assert_rel_acc_eq {
        ($rel_acc:expr, $actual:expr, $expected:expr) => {
            let rel_acc = $rel_acc;
            let actual = $actual;
            let expected = $expected;
            let diff = (actual - expected).abs();
            let max_error = rel_acc * expected.abs();
            assert!(
                diff <= max_error,
                "expected {} (+/-{}, {} - {}), got {}",
                expected,
                max_error,
                expected - max_error,
                expected + max_error,
                actual
            );
        };
    }

    #[test]
    fn test_empty_sketch() {
        let sketch = DDSketch::with_relative_accuracy(0.01).unwrap();

        assert!(sketch.is_empty());
        assert_eq!(sketch.count(), 0);
        assert_eq!(sketch.quantile(0.5), Err(SketchError::EmptySketch));
        assert_eq!(sketch.min_value(), Err(SketchError::EmptySketch));
        assert_eq!(sketch.max_value(), Err(SketchError::EmptySketch));
    }

    #[test]
    fn test_single_value() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch.add(42.0).unwrap();

        assert!(!sketch.is_empty());
        assert_eq!(sketch.count(), 1);

        let actual = sketch.quantile(0.5).unwrap();
        assert_rel_acc_eq!(0.01, actual, 42.0);
    }

    #[test]
    fn test_negative_value_rejected_without_mutation() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();

        assert_eq!(sketch.add(-1.0), Err(SketchError::ValueOutOfRange { value: -1.0 }));
        assert_eq!(sketch.count(), 0);
        assert!(sketch.is_empty());
    }

    #[test]
    fn test_oversized_value_rejected() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        let too_big = sketch.mapping().max_indexable_value() * 2.0;

        assert!(sketch.add(too_big).is_err());
        assert_eq!(sketch.count(), 0);
    }

    #[test]
    fn test_zero_values() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch.add(0.0).unwrap();
        sketch.add(0.0).unwrap();
        sketch.add(1.0).unwrap();

        assert_eq!(sketch.count(), 3);
        assert_eq!(sketch.zero_count(), 2);
        assert_eq!(sketch.min_value(), Ok(0.0));
        assert_eq!(sketch.quantile(0.0), Ok(0.0));
    }

    #[test]
    fn test_zero_only_sketch() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch.add_with_count(0.0, 5).unwrap();

        assert_eq!(sketch.count(), 5);
        assert_eq!(sketch.quantile(0.99), Ok(0.0));
        assert_eq!(sketch.min_value(), Ok(0.0));
        assert_eq!(sketch.max_value(), Ok(0.0));
    }

    #[test]
    fn test_invalid_quantile() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch.add(1.0).unwrap();

        assert!(matches!(sketch.quantile(-0.1), Err(SketchError::InvalidQuantile { .. })));
        assert!(matches!(sketch.quantile(1.1), Err(SketchError::InvalidQuantile { .. })));
    }

    #[test]
    fn test_quantiles_propagate_first_error() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch.add(1.0).unwrap();

        assert!(sketch.quantiles(&[0.5, 1.5, 0.9]).is_err());
        assert_eq!(sketch.quantiles(&[0.0, 1.0]).unwrap().len(), 2);
    }

    #[test]
    fn test_add_with_count() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch.add_with_count(10.0, 5).unwrap();
        sketch.add_with_count(10.0, 0).unwrap();

        assert_eq!(sketch.count(), 5);
    }

    #[test]
    fn test_min_max_values() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        for value in [4.0, 8.0, 15.0, 16.0, 23.0, 42.0] {
            sketch.add(value).unwrap();
        }

        assert_rel_acc_eq!(0.01, sketch.min_value().unwrap(), 4.0);
        assert_rel_acc_eq!(0.01, sketch.max_value().unwrap(), 42.0);
    }

    #[test]
    fn test_merge() {
        let mut sketch1 = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch1.add(1.0).unwrap();
        sketch1.add(2.0).unwrap();

        let mut sketch2 = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch2.add(3.0).unwrap();
        sketch2.add(0.0).unwrap();

        sketch1.merge(&sketch2).unwrap();

        assert_eq!(sketch1.count(), 4);
        assert_eq!(sketch1.zero_count(), 1);
    }

    #[test]
    fn test_merge_incompatible_mappings() {
        let mut sketch1 = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch1.add(1.0).unwrap();

        let mut sketch2 = DDSketch::with_relative_accuracy(0.05).unwrap();
        sketch2.add(2.0).unwrap();

        assert_eq!(sketch1.merge(&sketch2), Err(SketchError::IncompatibleMappings));
        // The receiver is unchanged.
        assert_eq!(sketch1.count(), 1);
    }

    #[test]
    fn test_copy_is_independent() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch.add(1.0).unwrap();

        let mut copy = sketch.clone();
        copy.add(2.0).unwrap();
        copy.add(0.0).unwrap();

        assert_eq!(sketch.count(), 1);
        assert_eq!(copy.count(), 3);
    }

    #[test]
    fn test_clear() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch.add(1.0).unwrap();
        sketch.add(0.0).unwrap();

        sketch.clear();

        assert!(sketch.is_empty());
        assert_eq!(sketch.count(), 0);
    }

    #[test]
    fn test_custom_composition() {
        let mapping = LinearlyInterpolatedMapping::new(0.02).unwrap();
        let mut sketch = DDSketch::new(mapping, SparseStore::new());

        for i in 1..=100 {
            sketch.add(i as f64).unwrap();
        }

        assert_eq!(sketch.count(), 100);
        assert_rel_acc_eq!(0.02, sketch.quantile(0.5).unwrap(), 50.0);
    }

    #[test]
    fn test_relative_accuracy_guarantee() {
        let accuracy = 0.01;
        let mut sketch = DDSketch::with_relative_accuracy(accuracy).unwrap();

        for i in 1..=1000 {
            sketch.add(i as f64).unwrap();
        }

        for q in [0.01, 0.25, 0.5, 0.75, 0.9, 0.95, 0.99] {
            let estimated = sketch.quantile(q).unwrap();
            // Rank of the nearest element in the sorted stream 1..=1000.
            let expected = (q * 999.0).floor() + 1.0;

            let relative_error = (estimated - expected).abs() / expected;
            assert!(
                relative_error <= accuracy + 1e-12,
                "quantile {} estimated {} expected {} error {}",
                q,
                estimated,
                expected,
                relative_error
            );
        }
    }

    #[test]
    fn test_collapsing_sketch_tail_accuracy() {
        let mut sketch = DDSketch::log_collapsing_lowest(0.01, 128).unwrap();
        for i in 1..=100_000 {
            sketch.add(i as f64).unwrap();
        }

        assert_eq!(sketch.count(), 100_000);
        assert!(sketch.store().is_collapsed());

        // Collapsing the low bins must not disturb the high quantiles.
        for q in [0.9, 0.95, 0.99] {
            let estimated = sketch.quantile(q).unwrap();
            let expected = (q * 99_999.0).floor() + 1.0;
            assert_rel_acc_eq!(0.011, estimated, expected);
        }
    }

    #[test]
    fn test_schema_roundtrip() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        for value in [1.0, 2.0, 3.0, 0.0, 100.0] {
            sketch.add(value).unwrap();
        }

        let schema = sketch.to_schema();
        let mapping = LogarithmicMapping::new(0.01).unwrap();
        let recovered: DDSketch = DDSketch::from_schema(&schema, mapping).unwrap();

        assert_eq!(sketch.count(), recovered.count());
        assert_eq!(sketch.zero_count(), recovered.zero_count());
        assert_eq!(sketch, recovered);
    }

    #[test]
    fn test_schema_gamma_mismatch() {
        let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
        sketch.add(1.0).unwrap();

        let schema = sketch.to_schema();
        let different_mapping = LogarithmicMapping::new(0.05).unwrap();
        let result: Result<DDSketch, _> = DDSketch::from_schema(&schema, different_mapping);

        assert!(matches!(result, Err(DeserializationError::GammaMismatch { .. })));
    }
}
