//! Error types for ORDO.
//!
//! The cache and scheduler never wrap failures raised by caller-supplied
//! functions; those surface unchanged. `OrdoError` covers the ambient layer
//! around them: configuration, input parsing, and file I/O.

use thiserror::Error;

/// Result type alias using `OrdoError`.
pub type Result<T> = std::result::Result<T, OrdoError>;

/// Main error type for ORDO configuration and host-program operations.
#[derive(Debug, Error)]
pub enum OrdoError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration value out of range.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Malformed `name:priority` task specification.
    #[error("Invalid task spec '{spec}': {reason}")]
    InvalidTaskSpec {
        /// The argument as given
        spec: String,
        /// What is wrong with it
        reason: String,
    },
}

impl OrdoError {
    /// Returns true if this error came from loading or validating configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            OrdoError::ConfigError(_) | OrdoError::JsonError(_) | OrdoError::IoError(_)
        )
    }

    /// Returns true if this is an input validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            OrdoError::ValidationError(_) | OrdoError::InvalidTaskSpec { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrdoError::InvalidTaskSpec {
            spec: "build".into(),
            reason: "missing priority".into(),
        };
        assert!(err.to_string().contains("build"));
        assert!(err.to_string().contains("missing priority"));
    }

    #[test]
    fn test_error_classification() {
        assert!(OrdoError::ConfigError("test".into()).is_config_error());
        assert!(!OrdoError::ConfigError("test".into()).is_validation_error());

        assert!(OrdoError::ValidationError("test".into()).is_validation_error());
        assert!(!OrdoError::ValidationError("test".into()).is_config_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid");
        let ordo_result: Result<serde_json::Value> = json_result.map_err(OrdoError::from);
        assert!(matches!(ordo_result, Err(OrdoError::JsonError(_))));
        assert!(ordo_result.unwrap_err().is_config_error());
    }
}
