// Calibration module - labeled fingerprint parsing and feature matrix assembly
//
// This module provides the training-side data pipeline:
// 1. LocationRegistry: dense ids for location names in first-seen order
// 2. FeatureHeader: the fixed sensor column order for a trained family
// 3. SignalMatrix: CSV parsing, per-location imputation and shuffling
//
// The pipeline:
// 1. Read the calibration CSV header (`location,<sensor-id>...`)
// 2. Register each row's location and parse its readings
// 3. Impute unobserved readings per location group, then shuffle rows

pub mod header;
pub mod imputation;
pub mod matrix;
pub mod registry;

pub use header::{sensor_id, FeatureHeader, LABEL_COLUMN};
pub use matrix::SignalMatrix;
pub use registry::LocationRegistry;

/// Reading value meaning "sensor not observed in this sample"
pub const NOT_OBSERVED: f64 = 0.0;
