//! # Store Errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a document store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid document JSON: {0}")]
    Json(String),
}

impl StoreError {
    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCollection(_) => "STORE_UNKNOWN_COLLECTION",
            Self::Backend(_) => "STORE_BACKEND_FAILED",
            Self::Io(_) => "STORE_IO_ERROR",
            Self::Json(_) => "STORE_INVALID_JSON",
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            StoreError::UnknownCollection("a".into()).code(),
            "STORE_UNKNOWN_COLLECTION"
        );
        assert_eq!(StoreError::backend("x").code(), "STORE_BACKEND_FAILED");
    }

    #[test]
    fn test_from_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let store_err: StoreError = err.into();
        assert_eq!(store_err.code(), "STORE_INVALID_JSON");
    }
}
