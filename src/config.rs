//! Engine configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object is
//! a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::join::{JoinType, DEFAULT_PAGE_SIZE};
use crate::observability::Severity;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Io(_) => "CONFIG_IO_ERROR",
            ConfigError::Json(_) => "CONFIG_INVALID_JSON",
            ConfigError::Invalid(_) => "CONFIG_INVALID",
        }
    }
}

/// Engine-wide defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JoinConfig {
    /// Tuples per lookup when a stage does not set its own page size
    pub default_page_size: usize,
    /// Join type when a stage does not set its own
    pub default_join_type: JoinType,
    /// Attach a logging observer to engines built from this config
    pub log_stages: bool,
    /// Minimum severity for stage logs
    pub log_level: Severity,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            default_join_type: JoinType::Left,
            log_stages: false,
            log_level: Severity::Info,
        }
    }
}

impl JoinConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: JoinConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "default_page_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = JoinConfig::default();
        assert_eq!(config.default_page_size, 25);
        assert_eq!(config.default_join_type, JoinType::Left);
        assert!(!config.log_stages);
        assert_eq!(config.log_level, Severity::Info);
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let file = write_config("{}");
        assert_eq!(JoinConfig::load(file.path()).unwrap(), JoinConfig::default());
    }

    #[test]
    fn test_load_overrides() {
        let file = write_config(
            r#"{"default_page_size": 10, "default_join_type": "inner", "log_stages": true, "log_level": "WARN"}"#,
        );
        let config = JoinConfig::load(file.path()).unwrap();
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.default_join_type, JoinType::Inner);
        assert_eq!(config.log_level, Severity::Warn);
        assert!(config.log_stages);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let file = write_config(r#"{"default_page_size": 0}"#);
        let err = JoinConfig::load(file.path()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_config(r#"{"page_size": 3}"#);
        let err = JoinConfig::load(file.path()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID_JSON");
    }

    #[test]
    fn test_missing_file() {
        let err = JoinConfig::load(Path::new("/nonexistent/docjoin.json")).unwrap_err();
        assert_eq!(err.code(), "CONFIG_IO_ERROR");
    }
}
