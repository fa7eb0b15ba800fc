// Classification service error types and constants

use crate::error::{ErrorCode, StoreError};
use log::error;
use std::fmt;

/// Classification error code constants
///
/// Error code range: 4001-4002
pub struct ClassifyErrorCodes {}

impl ClassifyErrorCodes {
    /// No trained instance exists for the requested family
    pub const MODEL_NOT_FOUND: i32 = 4001;

    /// Persisted instance exists but could not be loaded
    pub const STORE: i32 = 4002;
}

pub fn log_classify_error(err: &ClassifyError, context: &str) {
    error!(
        "Classify error in {}: code={}, component=InstanceManager, message={}",
        context,
        err.code(),
        err.message()
    );
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifyError {
    /// No persisted instance for this family
    ModelNotFound { family: String, path: String },

    /// Loading the persisted instance failed
    Store(StoreError),
}

impl From<StoreError> for ClassifyError {
    fn from(err: StoreError) -> Self {
        ClassifyError::Store(err)
    }
}

impl ErrorCode for ClassifyError {
    fn code(&self) -> i32 {
        match self {
            ClassifyError::ModelNotFound { .. } => ClassifyErrorCodes::MODEL_NOT_FOUND,
            ClassifyError::Store(_) => ClassifyErrorCodes::STORE,
        }
    }

    fn message(&self) -> String {
        match self {
            ClassifyError::ModelNotFound { path, .. } => format!("could not find '{}'", path),
            ClassifyError::Store(err) => err.message(),
        }
    }
}

impl fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassifyError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ClassifyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_wraps_message() {
        let err: ClassifyError = StoreError::Corrupt {
            path: "a.ai".to_string(),
            reason: "truncated".to_string(),
        }
        .into();
        assert_eq!(err.code(), ClassifyErrorCodes::STORE);
        assert!(err.message().contains("truncated"));
    }

    #[test]
    fn test_model_not_found_message() {
        let err = ClassifyError::ModelNotFound {
            family: "fam1".to_string(),
            path: "./fam1.ai".to_string(),
        };
        assert_eq!(err.message(), "could not find './fam1.ai'");
    }
}
