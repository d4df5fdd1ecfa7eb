//! # Join Errors
//!
//! Error codes:
//! - JOIN_SHAPE_INVALID (stage construction)
//! - JOIN_STORE_FAILED (fetch or lookup)
//! - JOIN_INTERNAL (executor bookkeeping)

use thiserror::Error;

use crate::store::StoreError;

/// Result type for join operations
pub type JoinResult<T> = Result<T, JoinError>;

/// Join errors
#[derive(Debug, Clone, Error)]
pub enum JoinError {
    /// Stage specification is malformed; reported before any store call.
    #[error("Invalid join stage: {0}")]
    Shape(String),

    /// A fetch or batch lookup against the store failed.
    #[error("Store failure on '{collection}': {source}")]
    Store {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JoinError {
    /// Create a shape error
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    /// Wrap a store error with the collection it was raised for
    pub fn store(collection: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            collection: collection.into(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable error code for logs and CLI responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Shape(_) => "JOIN_SHAPE_INVALID",
            Self::Store { .. } => "JOIN_STORE_FAILED",
            Self::Internal(_) => "JOIN_INTERNAL",
        }
    }

    /// Returns true if the error came from the store
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(JoinError::shape("x").code(), "JOIN_SHAPE_INVALID");
        assert_eq!(JoinError::internal("x").code(), "JOIN_INTERNAL");

        let err = JoinError::store("orders", StoreError::UnknownCollection("orders".into()));
        assert_eq!(err.code(), "JOIN_STORE_FAILED");
        assert!(err.is_store());
    }

    #[test]
    fn test_store_error_display_names_collection() {
        let err = JoinError::store("orders", StoreError::backend("connection reset"));
        let display = err.to_string();
        assert!(display.contains("orders"));
        assert!(display.contains("connection reset"));
    }
}
