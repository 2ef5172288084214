//! Linearly-interpolated index mapping implementation.

use snafu::{ensure, ResultExt as _};

use super::{floor_to_index, IndexMapping, EXP_OVERFLOW, MIN_NORMAL_F64};
use crate::common::{within_tolerance, MAPPING_EQUALITY_TOLERANCE};
use crate::error::{
    DeserializationError, InterpolationMismatch, InvalidGamma, InvalidMapping, InvalidRelativeAccuracy, SketchError,
};
use crate::schema::{IndexMappingSchema, Interpolation};

const EXPONENT_MASK: u64 = 0x7ff << SIGNIFICAND_BITS;
const EXPONENT_BIAS: i64 = 1023;
const SIGNIFICAND_BITS: u64 = 52;
const SIGNIFICAND_MASK: u64 = (1 << SIGNIFICAND_BITS) - 1;
const ONE_BITS: u64 = (EXPONENT_BIAS as u64) << SIGNIFICAND_BITS;

/// A fast index mapping that approximates [`LogarithmicMapping`][super::LogarithmicMapping] without evaluating a
/// logarithm.
///
/// The base-2 logarithm is read off the IEEE-754 bit pattern of the value: the exponent field gives its integer part,
/// and the significand linearly interpolates in-between. The interpolation error is folded into the effective
/// relative accuracy at construction time, so this mapping honors the same reconstruction guarantee as the exact one
/// while using slightly more buckets over the same value range.
#[derive(Clone, Debug)]
pub struct LinearlyInterpolatedMapping {
    /// The relative accuracy guarantee.
    relative_accuracy: f64,

    /// Rescales the approximate base-2 logarithm to bucket indices.
    multiplier: f64,

    /// The constant shift applied to all bucket indices, normalized against the approximate logarithm of 1.
    normalized_index_offset: f64,
}

impl LinearlyInterpolatedMapping {
    /// Creates a new linearly-interpolated mapping with the given relative accuracy.
    ///
    /// # Errors
    ///
    /// If the relative accuracy is not between 0 and 1 (exclusive), an error is returned.
    pub fn new(relative_accuracy: f64) -> Result<Self, SketchError> {
        ensure!(
            relative_accuracy > 0.0 && relative_accuracy < 1.0,
            InvalidRelativeAccuracy {
                value: relative_accuracy
            }
        );

        let multiplier = 1.0 / (2.0 * relative_accuracy / (1.0 - relative_accuracy)).ln_1p();
        Ok(Self {
            relative_accuracy,
            multiplier,
            normalized_index_offset: 0.0,
        })
    }

    /// Creates a new linearly-interpolated mapping from a gamma value and an index offset.
    ///
    /// This constructor is intended for reconstructing a mapping from serialized parameters; the effective relative
    /// accuracy, including the interpolation error, is derived from `gamma`.
    ///
    /// # Errors
    ///
    /// If `gamma` is not greater than 1, an error is returned.
    pub fn with_gamma(gamma: f64, index_offset: f64) -> Result<Self, SketchError> {
        ensure!(gamma > 1.0, InvalidGamma { value: gamma });

        let multiplier = 1.0 / gamma.log2();
        Ok(Self {
            relative_accuracy: 1.0 - 2.0 / (1.0 + gamma.log2().exp()),
            multiplier,
            normalized_index_offset: index_offset - approximate_log(1.0) * multiplier,
        })
    }
}

impl IndexMapping for LinearlyInterpolatedMapping {
    fn index(&self, value: f64) -> i32 {
        floor_to_index(approximate_log(value) * self.multiplier + self.normalized_index_offset)
    }

    fn value(&self, index: i32) -> f64 {
        approximate_inverse_log((f64::from(index) - self.normalized_index_offset) / self.multiplier)
            * (1.0 + self.relative_accuracy)
    }

    fn relative_accuracy(&self) -> f64 {
        self.relative_accuracy
    }

    fn min_indexable_value(&self) -> f64 {
        f64::max(
            // Smallest value whose index is at least i16::MIN.
            ((f64::from(i16::MIN) - self.normalized_index_offset) / self.multiplier - approximate_log(1.0) + 1.0)
                .exp2(),
            // Smallest value the reconstruction cannot underflow below the normal range.
            MIN_NORMAL_F64 * (1.0 + self.relative_accuracy) / (1.0 - self.relative_accuracy),
        )
    }

    fn max_indexable_value(&self) -> f64 {
        f64::min(
            // Largest value whose index is at most i16::MAX.
            ((f64::from(i16::MAX) - self.normalized_index_offset) / self.multiplier - approximate_log(1.0) - 1.0)
                .exp2(),
            // Largest value whose reconstruction does not overflow `exp`.
            EXP_OVERFLOW.exp() / (1.0 + self.relative_accuracy),
        )
    }

    fn gamma(&self) -> f64 {
        (1.0 / self.multiplier).exp2()
    }

    fn index_offset(&self) -> f64 {
        self.normalized_index_offset + approximate_log(1.0) * self.multiplier
    }

    fn interpolation(&self) -> Interpolation {
        Interpolation::Linear
    }

    fn from_schema(schema: &IndexMappingSchema) -> Result<Self, DeserializationError> {
        ensure!(
            schema.interpolation == Interpolation::Linear,
            InterpolationMismatch {
                expected: Interpolation::Linear,
                actual: schema.interpolation
            }
        );

        Self::with_gamma(schema.gamma, schema.index_offset).context(InvalidMapping)
    }
}

impl PartialEq for LinearlyInterpolatedMapping {
    fn eq(&self, other: &Self) -> bool {
        within_tolerance(self.multiplier, other.multiplier, MAPPING_EQUALITY_TOLERANCE)
            && within_tolerance(
                self.normalized_index_offset,
                other.normalized_index_offset,
                MAPPING_EQUALITY_TOLERANCE,
            )
    }
}

impl Default for LinearlyInterpolatedMapping {
    /// Creates a linearly-interpolated mapping with 1% relative accuracy (the common default).
    fn default() -> Self {
        Self::new(0.01).expect("0.01 is a valid relative accuracy")
    }
}

// Approximates log2(x) by reading the exponent field of `x` and linearly interpolating within the exponent's
// bracket. The result is offset by 1 from the true log2: the significand contributes a value in [1, 2).
fn approximate_log(x: f64) -> f64 {
    let bits = x.to_bits();
    exponent(bits) + significand_plus_one(bits)
}

// The exact inverse of `approximate_log`.
fn approximate_inverse_log(x: f64) -> f64 {
    let exponent = (x - 1.0).floor();
    let significand_plus_one = x - exponent;
    build_float(exponent as i64, significand_plus_one)
}

#[inline]
fn exponent(bits: u64) -> f64 {
    (((bits & EXPONENT_MASK) >> SIGNIFICAND_BITS) as i64 - EXPONENT_BIAS) as f64
}

#[inline]
fn significand_plus_one(bits: u64) -> f64 {
    f64::from_bits((bits & SIGNIFICAND_MASK) | ONE_BITS)
}

#[inline]
fn build_float(exponent: i64, significand_plus_one: f64) -> f64 {
    f64::from_bits(
        (((exponent + EXPONENT_BIAS) as u64) << SIGNIFICAND_BITS) | (significand_plus_one.to_bits() & SIGNIFICAND_MASK),
    )
}
