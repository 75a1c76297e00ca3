//! Error types shared by the governance crates
//!
//! Only construction-time failures (bad config files, unparsable
//! documents) surface through this type. Per-request guardrail failures
//! are absorbed by the engine.

/// Result type alias for governance operations
pub type Result<T> = std::result::Result<T, GovernanceError>;

/// Main error type for configuration and bootstrap
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration parsing errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] config::ConfigError),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl GovernanceError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = GovernanceError::config("missing agent section");
        assert!(matches!(err, GovernanceError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: missing agent section");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = GovernanceError::from(io_err);
        assert!(matches!(err, GovernanceError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = GovernanceError::from(json_err);
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
