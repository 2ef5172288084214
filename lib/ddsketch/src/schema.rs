//! Logical serialization schema.
//!
//! A sketch serializes to three logical parts: the parameters of its index mapping, the bins of its store, and the
//! count of values mapped to zero. The types in this module define those fields without committing to a wire format:
//! carrying the schema over a concrete encoding (protobuf, JSON, ...) is left to the caller. With the `serde` feature
//! enabled, all schema types derive `Serialize`/`Deserialize` so any serde-compatible format can be used directly.
//!
//! Reconstruction always goes through the validated conversion methods ([`DDSketch::from_schema`],
//! [`IndexMapping::from_schema`], [`Store::merge_from_schema`]), which reject negative or non-integer counts and
//! mismatched mapping parameters.
//!
//! [`DDSketch::from_schema`]: crate::DDSketch::from_schema
//! [`IndexMapping::from_schema`]: crate::IndexMapping::from_schema
//! [`Store::merge_from_schema`]: crate::Store::merge_from_schema

use std::collections::BTreeMap;

/// The interpolation scheme used by an index mapping to approximate the logarithm.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Interpolation {
    /// No interpolation: the mapping evaluates an exact logarithm.
    None,

    /// The logarithm is linearly interpolated between consecutive powers of two.
    Linear,
}

/// Serialized parameters of an index mapping.
///
/// `gamma` and `index_offset` fully determine a mapping of a given interpolation scheme; the relative accuracy is
/// derived from `gamma` on reconstruction.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct IndexMappingSchema {
    /// The base ratio between consecutive bucket boundaries.
    pub gamma: f64,

    /// The constant shift applied to all bucket indices.
    pub index_offset: f64,

    /// The interpolation scheme of the mapping.
    pub interpolation: Interpolation,
}

/// Serialized contents of a bucket store.
///
/// Bins can be carried sparsely (`bin_counts`) or as a contiguous run (`contiguous_bin_counts` addressed from
/// `contiguous_bin_index_offset`); a store emits whichever encoding matches its internal layout, and reconstruction
/// accepts both. Counts are carried as `f64` and validated to be non-negative integers on reconstruction.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StoreSchema {
    /// Bin counts keyed by index, for sparsely-populated stores.
    pub bin_counts: BTreeMap<i32, f64>,

    /// Bin counts of a contiguous run of indices, for densely-populated stores.
    pub contiguous_bin_counts: Vec<f64>,

    /// The index of the first entry of `contiguous_bin_counts`.
    pub contiguous_bin_index_offset: i32,

    /// The configured bin limit, for bounded stores.
    pub max_num_bins: Option<u32>,

    /// Whether the store has already collapsed boundary bins.
    pub collapsed: bool,
}

/// Serialized form of a sketch.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SketchSchema {
    /// The parameters of the sketch's index mapping.
    pub mapping: IndexMappingSchema,

    /// The bins of the sketch's store.
    pub store: StoreSchema,

    /// The count of values treated as exact zero.
    pub zero_count: f64,
}
