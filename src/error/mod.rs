// Error types for the location engine
//
// This module defines custom error types for training, persistence, model
// fitting and classification, with stable numeric codes so the service layer
// can map failures without string matching.

mod classify;
mod model;
mod store;
mod training;

pub use classify::{log_classify_error, ClassifyError, ClassifyErrorCodes};
pub use model::{ModelError, ModelErrorCodes};
pub use store::{log_store_error, StoreError, StoreErrorCodes};
pub use training::{log_training_error, TrainingError, TrainingErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the CLI and any embedding service.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
