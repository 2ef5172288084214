//! A fully-mergeable quantile sketch with relative-error guarantees.
//!
//! `DDSketch` computes approximate quantiles over a stream of non-negative values using a configurable amount of
//! memory, with a guaranteed bound on the relative error of every answer. Independently built sketches over the same
//! configuration merge into an exact union, making it a natural fit for metrics pipelines where partial aggregates
//! are computed close to the data and combined centrally.
//!
//! # Quick Start
//!
//! ```
//! use ddsketch::DDSketch;
//!
//! // Create a sketch with 1% relative accuracy.
//! let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
//!
//! // Add some values.
//! sketch.add(1.5).unwrap();
//! sketch.add(2.5).unwrap();
//! sketch.add(3.5).unwrap();
//!
//! // Query quantiles.
//! let p50 = sketch.quantile(0.5).unwrap();
//! let p99 = sketch.quantile(0.99).unwrap();
//! ```
//!
//! # Composition
//!
//! A sketch is the composition of an index mapping ([`mapping`]) and a bucket store ([`store`]). The mapping decides
//! how values translate to bucket indices, trading per-insertion cost against nothing else: both provided mappings
//! honor the same accuracy contract. The store decides how bucket counts are kept, trading memory against accuracy
//! at the boundary quantiles. The provided constructors cover the common pairings; [`DDSketch::new`] accepts any
//! combination.
//!
//! # Features
//!
//! This crate exposes a single feature, `serde`, which enables serialization and deserialization of the logical
//! [`schema`] types with `serde`. The schema pins down the fields a sketch serializes to; the choice of wire format
//! is left to the caller.
#![deny(warnings)]
#![deny(missing_docs)]

mod common;

mod error;
pub use self::error::{DeserializationError, SketchError};

pub mod mapping;
pub use self::mapping::{IndexMapping, LinearlyInterpolatedMapping, LogarithmicMapping};

pub mod schema;

pub mod store;
pub use self::store::{
    Bin, Bins, CollapsingHighestDenseStore, CollapsingLowestDenseStore, DenseStore, SparseStore, Store,
};

mod sketch;
pub use self::sketch::DDSketch;
