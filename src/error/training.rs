// Training error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Training error code constants
///
/// Error code range: 1001-1006
pub struct TrainingErrorCodes {}

impl TrainingErrorCodes {
    /// Calibration CSV does not exist
    pub const CALIBRATION_NOT_FOUND: i32 = 1001;

    /// Calibration CSV could not be read or framed
    pub const CALIBRATION_READ: i32 = 1002;

    /// Calibration CSV has a header but no samples
    pub const EMPTY_CALIBRATION: i32 = 1003;

    /// Every classifier family failed or timed out
    pub const NO_MODELS_TRAINED: i32 = 1004;

    /// Training configuration is unusable
    pub const INVALID_CONFIG: i32 = 1005;

    /// Trained instance could not be persisted
    pub const STORE_PERSIST: i32 = 1006;
}

/// Log a training error with structured context
pub fn log_training_error(err: &TrainingError, context: &str) {
    error!(
        "Training error in {}: code={}, component=ModelTrainer, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Training-related errors
///
/// Only the calibration file I/O cases and the "nothing trained" case are
/// fatal for a training run; per-family failures never surface here.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingError {
    /// Calibration file missing
    CalibrationNotFound { path: String },

    /// Calibration file unreadable or malformed at the CSV framing level
    CalibrationRead { path: String, reason: String },

    /// Calibration file contained no sample rows
    EmptyCalibration { path: String },

    /// No classifier family produced a model
    NoModelsTrained { attempted: usize },

    /// Configuration rejected before training started
    InvalidConfig { reason: String },

    /// Saving the trained instance failed
    StorePersist { reason: String },
}

impl ErrorCode for TrainingError {
    fn code(&self) -> i32 {
        match self {
            TrainingError::CalibrationNotFound { .. } => TrainingErrorCodes::CALIBRATION_NOT_FOUND,
            TrainingError::CalibrationRead { .. } => TrainingErrorCodes::CALIBRATION_READ,
            TrainingError::EmptyCalibration { .. } => TrainingErrorCodes::EMPTY_CALIBRATION,
            TrainingError::NoModelsTrained { .. } => TrainingErrorCodes::NO_MODELS_TRAINED,
            TrainingError::InvalidConfig { .. } => TrainingErrorCodes::INVALID_CONFIG,
            TrainingError::StorePersist { .. } => TrainingErrorCodes::STORE_PERSIST,
        }
    }

    fn message(&self) -> String {
        match self {
            TrainingError::CalibrationNotFound { path } => {
                format!("could not find '{}'", path)
            }
            TrainingError::CalibrationRead { path, reason } => {
                format!("failed to read calibration '{}': {}", path, reason)
            }
            TrainingError::EmptyCalibration { path } => {
                format!("calibration '{}' has no samples", path)
            }
            TrainingError::NoModelsTrained { attempted } => {
                format!("none of {} classifier families trained", attempted)
            }
            TrainingError::InvalidConfig { reason } => {
                format!("Invalid training config: {}", reason)
            }
            TrainingError::StorePersist { reason } => {
                format!("Failed to persist trained models: {}", reason)
            }
        }
    }
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrainingError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TrainingError {}
