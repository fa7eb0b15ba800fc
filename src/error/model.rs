// Per-family model errors
//
// These never abort a training or classification run; the trainer and the
// engine log them and drop the affected family.

use crate::error::ErrorCode;
use std::fmt;

/// Model error code constants
///
/// Error code range: 3001-3006
pub struct ModelErrorCodes {}

impl ModelErrorCodes {
    pub const EMPTY_DATA: i32 = 3001;
    pub const DIMENSION_MISMATCH: i32 = 3002;
    pub const INSUFFICIENT_CLASSES: i32 = 3003;
    pub const INVALID_PARAMETER: i32 = 3004;
    pub const NUMERICAL: i32 = 3005;
    pub const TIMEOUT: i32 = 3006;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Fit called with no rows
    EmptyData,

    /// Feature vector width does not match the fitted width
    DimensionMismatch { expected: usize, got: usize },

    /// Algorithm needs more distinct classes than present
    InsufficientClasses { required: usize, found: usize },

    /// Hyperparameter value incompatible with the data
    InvalidParameter { name: String, reason: String },

    /// Singular matrix, non-finite weights and similar
    Numerical { reason: String },

    /// Fit exceeded its execution budget
    Timeout { seconds: u64 },
}

impl ErrorCode for ModelError {
    fn code(&self) -> i32 {
        match self {
            ModelError::EmptyData => ModelErrorCodes::EMPTY_DATA,
            ModelError::DimensionMismatch { .. } => ModelErrorCodes::DIMENSION_MISMATCH,
            ModelError::InsufficientClasses { .. } => ModelErrorCodes::INSUFFICIENT_CLASSES,
            ModelError::InvalidParameter { .. } => ModelErrorCodes::INVALID_PARAMETER,
            ModelError::Numerical { .. } => ModelErrorCodes::NUMERICAL,
            ModelError::Timeout { .. } => ModelErrorCodes::TIMEOUT,
        }
    }

    fn message(&self) -> String {
        match self {
            ModelError::EmptyData => "Cannot fit with zero samples".to_string(),
            ModelError::DimensionMismatch { expected, got } => {
                format!("Feature dimension mismatch: expected {}, got {}", expected, got)
            }
            ModelError::InsufficientClasses { required, found } => {
                format!("Need at least {} classes, found {}", required, found)
            }
            ModelError::InvalidParameter { name, reason } => {
                format!("Invalid parameter {}: {}", name, reason)
            }
            ModelError::Numerical { reason } => format!("Numerical failure: {}", reason),
            ModelError::Timeout { seconds } => {
                format!("fit timeout [{} seconds] exceeded", seconds)
            }
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ModelError {}
