// Model store error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Store error code constants
///
/// Error code range: 2001-2004
pub struct StoreErrorCodes {}

impl StoreErrorCodes {
    /// Persisted model file does not exist
    pub const NOT_FOUND: i32 = 2001;

    /// Stream truncated, CRC mismatch or undecodable payload
    pub const CORRUPT: i32 = 2002;

    /// Filesystem failure other than not-found
    pub const IO: i32 = 2003;

    /// Encoding a component failed while saving
    pub const SERIALIZE: i32 = 2004;
}

/// Log a store error with structured context
pub fn log_store_error(err: &StoreError, context: &str) {
    error!(
        "Store error in {}: code={}, component=ModelStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Model store errors
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No persisted instance at this path
    NotFound { path: String },

    /// Persisted instance could not be decoded
    Corrupt { path: String, reason: String },

    /// Other filesystem error
    Io { path: String, reason: String },

    /// Encoding failed during save
    Serialize { reason: String },
}

impl StoreError {
    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        let path = path.display().to_string();
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound { path }
        } else {
            StoreError::Io {
                path,
                reason: err.to_string(),
            }
        }
    }
}

impl ErrorCode for StoreError {
    fn code(&self) -> i32 {
        match self {
            StoreError::NotFound { .. } => StoreErrorCodes::NOT_FOUND,
            StoreError::Corrupt { .. } => StoreErrorCodes::CORRUPT,
            StoreError::Io { .. } => StoreErrorCodes::IO,
            StoreError::Serialize { .. } => StoreErrorCodes::SERIALIZE,
        }
    }

    fn message(&self) -> String {
        match self {
            StoreError::NotFound { path } => format!("could not find '{}'", path),
            StoreError::Corrupt { path, reason } => {
                format!("model file '{}' is corrupt: {}", path, reason)
            }
            StoreError::Io { path, reason } => format!("I/O error on '{}': {}", path, reason),
            StoreError::Serialize { reason } => format!("Serialization failed: {}", reason),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StoreError {}
