//! Round-trips the serialization schema through a concrete serde format.
//!
//! The crate only defines the logical serialization fields; this exercises carrying them over JSON, the way an
//! external transport would.
#![cfg(feature = "serde")]

use ddsketch::schema::SketchSchema;
use ddsketch::{DDSketch, LinearlyInterpolatedMapping, LogarithmicMapping, SparseStore};

#[test]
fn test_sketch_roundtrip_through_json() {
    let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
    for value in [0.0, 0.5, 1.0, 10.0, 250.0, 10_000.0] {
        sketch.add(value).unwrap();
    }

    let encoded = serde_json::to_string(&sketch.to_schema()).unwrap();
    let decoded: SketchSchema = serde_json::from_str(&encoded).unwrap();

    let mapping = LogarithmicMapping::new(0.01).unwrap();
    let recovered: DDSketch = DDSketch::from_schema(&decoded, mapping).unwrap();

    assert_eq!(sketch, recovered);
    for q in [0.0, 0.5, 0.99] {
        assert_eq!(sketch.quantile(q).unwrap(), recovered.quantile(q).unwrap());
    }
}

#[test]
fn test_sparse_sketch_roundtrip_through_json() {
    let mapping = LinearlyInterpolatedMapping::new(0.02).unwrap();
    let mut sketch = DDSketch::new(mapping.clone(), SparseStore::new());
    for value in [3.5, 700.0, 0.002] {
        sketch.add(value).unwrap();
    }

    let encoded = serde_json::to_string(&sketch.to_schema()).unwrap();
    let decoded: SketchSchema = serde_json::from_str(&encoded).unwrap();

    let recovered = DDSketch::from_schema(&decoded, mapping).unwrap();
    assert_eq!(sketch, recovered);
}

#[test]
fn test_tampered_counts_are_rejected() {
    let mut sketch = DDSketch::with_relative_accuracy(0.01).unwrap();
    sketch.add(42.0).unwrap();

    let mut schema = sketch.to_schema();
    schema.zero_count = -1.0;

    let mapping = LogarithmicMapping::new(0.01).unwrap();
    let result: Result<DDSketch, _> = DDSketch::from_schema(&schema, mapping);
    assert!(result.is_err());
}
