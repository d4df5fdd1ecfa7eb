//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero exit code.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::join::JoinError;
use crate::store::StoreError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// Plan file missing, malformed or with an invalid stage
    PlanInvalid,
    /// Data directory could not be loaded
    DataLoadFailed,
    /// Pipeline failed while running
    JoinFailed,
    /// I/O error (stdout, runtime)
    IoError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "DOCJOIN_CLI_CONFIG_ERROR",
            Self::PlanInvalid => "DOCJOIN_CLI_PLAN_INVALID",
            Self::DataLoadFailed => "DOCJOIN_CLI_DATA_LOAD_FAILED",
            Self::JoinFailed => "DOCJOIN_CLI_JOIN_FAILED",
            Self::IoError => "DOCJOIN_CLI_IO_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn plan_invalid(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::PlanInvalid, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::new(CliErrorCode::ConfigError, format!("{}: {}", e.code(), e))
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::new(CliErrorCode::DataLoadFailed, format!("{}: {}", e.code(), e))
    }
}

impl From<JoinError> for CliError {
    fn from(e: JoinError) -> Self {
        let code = match e {
            JoinError::Shape(_) => CliErrorCode::PlanInvalid,
            _ => CliErrorCode::JoinFailed,
        };
        Self::new(code, format!("{}: {}", e.code(), e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::plan_invalid("no stages");
        assert_eq!(err.to_string(), "DOCJOIN_CLI_PLAN_INVALID: no stages");
    }

    #[test]
    fn test_join_error_mapping() {
        let shape: CliError = JoinError::shape("arity").into();
        assert_eq!(shape.code(), &CliErrorCode::PlanInvalid);

        let store: CliError = JoinError::store("items", StoreError::backend("down")).into();
        assert_eq!(store.code(), &CliErrorCode::JoinFailed);
        assert!(store.message().starts_with("JOIN_STORE_FAILED"));
    }
}
