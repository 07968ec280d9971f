//! Configuration error types following panic-free policy.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or interpreting configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    /// The configuration file is not valid TOML
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A key holds a value that cannot be used
    #[error("Invalid value for {key}: {value} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid-value error.
    pub fn invalid(key: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::invalid("PORT", "70000", "port out of range");
        assert_eq!(
            err.to_string(),
            "Invalid value for PORT: 70000 (port out of range)"
        );
    }

    #[test]
    fn test_read_error_display() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/ftpd/ftpd.toml"),
            error: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("/etc/ftpd/ftpd.toml"));
        assert!(err.to_string().contains("permission denied"));
    }
}
