//! Error types.

use snafu::Snafu;

/// Errors returned by sketch construction and mutation.
///
/// All of these are recoverable conditions: a failed operation leaves the sketch unchanged.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum SketchError {
    /// The relative accuracy is outside of the valid range.
    #[snafu(display("relative accuracy must be between 0 and 1 (exclusive), got {value}"))]
    InvalidRelativeAccuracy {
        /// The rejected relative accuracy.
        value: f64,
    },

    /// The gamma parameter is not greater than 1.
    #[snafu(display("gamma must be greater than 1, got {value}"))]
    InvalidGamma {
        /// The rejected gamma value.
        value: f64,
    },

    /// The value is negative or exceeds the maximum indexable value of the mapping.
    #[snafu(display("value {value} is outside the range tracked by the sketch"))]
    ValueOutOfRange {
        /// The rejected input value.
        value: f64,
    },

    /// The quantile is outside of `[0, 1]`.
    #[snafu(display("quantile must be between 0 and 1, got {quantile}"))]
    InvalidQuantile {
        /// The rejected quantile.
        quantile: f64,
    },

    /// The queried sketch contains no values.
    #[snafu(display("sketch contains no values"))]
    EmptySketch,

    /// The two sketches being merged do not use equal index mappings.
    #[snafu(display("cannot merge sketches with different index mappings"))]
    IncompatibleMappings,
}

/// Errors that can occur when reconstructing a sketch, mapping, or store from its serialized form.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum DeserializationError {
    /// The serialized mapping uses a different interpolation scheme than the target mapping type.
    #[snafu(display("serialized mapping uses interpolation {actual:?}, expected {expected:?}"))]
    InterpolationMismatch {
        /// The interpolation scheme of the target mapping type.
        expected: crate::schema::Interpolation,
        /// The interpolation scheme found in the serialized form.
        actual: crate::schema::Interpolation,
    },

    /// The serialized mapping parameters do not describe a valid mapping.
    #[snafu(display("serialized mapping parameters are invalid: {source}"))]
    InvalidMapping {
        /// The underlying construction error.
        source: SketchError,
    },

    /// The gamma value in the serialized form does not match the expected gamma.
    #[snafu(display("gamma mismatch: expected {expected}, got {actual}"))]
    GammaMismatch {
        /// The expected gamma value.
        expected: f64,
        /// The gamma value found in the serialized form.
        actual: f64,
    },

    /// The index offset in the serialized form does not match the expected index offset.
    #[snafu(display("index offset mismatch: expected {expected}, got {actual}"))]
    IndexOffsetMismatch {
        /// The expected index offset.
        expected: f64,
        /// The index offset found in the serialized form.
        actual: f64,
    },

    /// A bin count value is negative, which is invalid.
    #[snafu(display("negative bin count at index {index}: {count}"))]
    NegativeBinCount {
        /// The bin index.
        index: i32,
        /// The negative count value.
        count: f64,
    },

    /// A bin count value is not a valid integer.
    #[snafu(display("non-integer bin count at index {index}: {count}"))]
    NonIntegerBinCount {
        /// The bin index.
        index: i32,
        /// The non-integer count value.
        count: f64,
    },

    /// The zero count is negative.
    #[snafu(display("negative zero count: {count}"))]
    NegativeZeroCount {
        /// The negative zero count value.
        count: f64,
    },

    /// The zero count is not a valid integer.
    #[snafu(display("non-integer zero count: {count}"))]
    NonIntegerZeroCount {
        /// The non-integer zero count value.
        count: f64,
    },
}
