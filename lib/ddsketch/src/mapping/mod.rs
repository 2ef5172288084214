//! Index mappings.
//!
//! An index mapping defines the relationship between floating-point values and integer bucket indices, and with it
//! the relative accuracy of the sketch: for any value `v` within the indexable range, the value reconstructed from
//! `index(v)` is guaranteed to be within `relative_accuracy()` of `v`.
//!
//! Two mappings are provided:
//!
//! - [`LogarithmicMapping`]: evaluates an exact logarithm per insertion. Memory-optimal for a given accuracy.
//! - [`LinearlyInterpolatedMapping`]: approximates the logarithm from the IEEE-754 bit pattern of the value, trading
//!   slightly narrower buckets for avoiding a transcendental function call per insertion.

use snafu::ensure;

use crate::common::{float_eq, within_tolerance, MAPPING_EQUALITY_TOLERANCE};
use crate::error::{DeserializationError, GammaMismatch, IndexOffsetMismatch, InterpolationMismatch};
use crate::schema::{IndexMappingSchema, Interpolation};

mod logarithmic;
pub use self::logarithmic::LogarithmicMapping;

mod linear;
pub use self::linear::LinearlyInterpolatedMapping;

// The value at which `f64::exp` overflows.
pub(crate) const EXP_OVERFLOW: f64 = 7.094361393031e2;

// The smallest positive normal f64, 2^(-1022).
pub(crate) const MIN_NORMAL_F64: f64 = 2.2250738585072014e-308;

/// Maps values to bucket indices and vice versa.
///
/// Mappings are immutable once constructed. Equality (`PartialEq`) compares the derived `multiplier` and index offset
/// within a fixed tolerance, so two mappings constructed through different routes but numerically equivalent compare
/// equal; this is the compatibility check used when merging sketches.
///
/// Bucket indices are kept within the 16-bit signed range: [`min_indexable_value`][Self::min_indexable_value] and
/// [`max_indexable_value`][Self::max_indexable_value] are derived so that any value between them maps to an index
/// between `i16::MIN` and `i16::MAX` without overflowing the underlying exponential.
pub trait IndexMapping: Clone + PartialEq + Send + Sync {
    /// Returns the bucket index for the given positive value.
    fn index(&self, value: f64) -> i32;

    /// Returns the representative value of the bucket at the given index.
    ///
    /// The representative value is the bucket's lower bound corrected towards its midpoint, so that the
    /// reconstruction error is bounded by the relative accuracy on both sides of the bucket.
    fn value(&self, index: i32) -> f64;

    /// Returns the relative accuracy guaranteed by this mapping.
    fn relative_accuracy(&self) -> f64;

    /// Returns the smallest positive value that can be indexed.
    ///
    /// Values at or below this threshold cannot be mapped safely and are tracked by the sketch as exact zeros.
    fn min_indexable_value(&self) -> f64;

    /// Returns the largest value that can be indexed.
    fn max_indexable_value(&self) -> f64;

    /// Returns the base ratio between consecutive bucket boundaries.
    fn gamma(&self) -> f64;

    /// Returns the constant shift applied to all bucket indices.
    fn index_offset(&self) -> f64;

    /// Returns the interpolation scheme of this mapping.
    fn interpolation(&self) -> Interpolation;

    /// Reconstructs a mapping from its serialized parameters.
    ///
    /// This always builds a fresh mapping: reconstruction never touches the configuration of any existing instance.
    /// The reconstructed mapping compares equal to the one that produced the schema.
    ///
    /// # Errors
    ///
    /// If the schema describes a different interpolation scheme than this mapping type, or carries invalid
    /// parameters, an error is returned.
    fn from_schema(schema: &IndexMappingSchema) -> Result<Self, DeserializationError>
    where
        Self: Sized;

    /// Converts this mapping to its serialized parameters.
    fn to_schema(&self) -> IndexMappingSchema {
        IndexMappingSchema {
            gamma: self.gamma(),
            index_offset: self.index_offset(),
            interpolation: self.interpolation(),
        }
    }

    /// Validates that serialized mapping parameters are compatible with this mapping.
    ///
    /// # Errors
    ///
    /// If the interpolation scheme, gamma, or index offset of the schema do not match this mapping's own parameters,
    /// an error describing the mismatch is returned.
    fn validate_schema(&self, schema: &IndexMappingSchema) -> Result<(), DeserializationError> {
        ensure!(
            schema.interpolation == self.interpolation(),
            InterpolationMismatch {
                expected: self.interpolation(),
                actual: schema.interpolation
            }
        );

        ensure!(
            float_eq(schema.gamma, self.gamma()),
            GammaMismatch {
                expected: self.gamma(),
                actual: schema.gamma
            }
        );

        ensure!(
            within_tolerance(schema.index_offset, self.index_offset(), MAPPING_EQUALITY_TOLERANCE),
            IndexOffsetMismatch {
                expected: self.index_offset(),
                actual: schema.index_offset
            }
        );

        Ok(())
    }
}

// Maps a fractional index to its integer bucket, rounding towards negative infinity.
#[inline]
pub(crate) fn floor_to_index(index: f64) -> i32 {
    if index >= 0.0 {
        index as i32
    } else {
        (index as i32) - 1
    }
}
