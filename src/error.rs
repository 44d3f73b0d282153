use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuantError {
    // Validation errors
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("validation error: {0}")]
    Validation(String),

    // Codec state errors
    #[error("product quantizer is not trained")]
    NotTrained,

    // Capacity errors
    #[error("store is at capacity ({max} vectors)")]
    Capacity { max: usize },

    // Import errors
    #[error("integrity error: {0}")]
    Integrity(String),

    // Serialization errors
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    // IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QuantError>;

/// Coarse error classification surfaced to callers that map errors onto
/// their own taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotTrained,
    Capacity,
    Integrity,
    Internal,
}

impl QuantError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuantError::DimensionMismatch { .. } | QuantError::Validation(_) => {
                ErrorKind::Validation
            }

            QuantError::NotTrained => ErrorKind::NotTrained,

            QuantError::Capacity { .. } => ErrorKind::Capacity,

            QuantError::Integrity(_) | QuantError::Json(_) => ErrorKind::Integrity,

            QuantError::Config(_) | QuantError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Errors the caller can fix by changing its input, as opposed to
    /// environment failures.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Internal)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_kind() {
        let err = QuantError::DimensionMismatch {
            expected: 128,
            actual: 256,
        };
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = QuantError::Validation("bad input".into());
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_not_trained_kind() {
        assert_eq!(QuantError::NotTrained.kind(), ErrorKind::NotTrained);
    }

    #[test]
    fn test_capacity_kind() {
        let err = QuantError::Capacity { max: 10 };
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_json_errors_are_integrity() {
        let json_err = serde_json::from_str::<Vec<u8>>("[1, \"x\"]").unwrap_err();
        let err: QuantError = json_err.into();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_internal_kind() {
        let err = QuantError::Config("missing key".into());
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_caller_error());

        let err = QuantError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_display_formatting() {
        let err = QuantError::DimensionMismatch {
            expected: 128,
            actual: 256,
        };
        let msg = err.to_string();
        assert!(msg.contains("128"));
        assert!(msg.contains("256"));

        let err = QuantError::Integrity("code out of range".into());
        assert!(err.to_string().contains("code out of range"));
    }
}
