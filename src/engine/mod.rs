//! Engine module housing the trained AI instance.
//!
//! `AiInstance` owns everything persisted for one deployment family (header,
//! location registry and trained models) and answers live classification
//! requests. Classification is read-only, so one instance can be shared
//! behind an `Arc` and queried from any number of threads.

pub mod classify;
pub mod instance;

pub use classify::{Classification, Prediction};
pub use instance::{AiInstance, SensorReading};
