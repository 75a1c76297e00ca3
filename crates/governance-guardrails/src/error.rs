//! Error types for guardrails

use governance_core::GovernanceError;
use governance_telemetry::TelemetryError;

/// Result type for guardrail operations
pub type Result<T> = std::result::Result<T, GuardrailError>;

/// Errors that can occur in guardrail operations
///
/// Everything except [`GuardrailError::Internal`] is raised while building
/// an engine and is fatal at startup. Errors raised inside a check never
/// reach the caller of a pipeline; the engine turns them into a
/// `guardrail_error` block.
#[derive(Debug, thiserror::Error)]
pub enum GuardrailError {
    /// Invalid or inconsistent policy configuration
    #[error("Guardrail configuration error: {0}")]
    Config(String),

    /// A JSON Schema could not be loaded or compiled
    #[error("Schema error: {0}")]
    Schema(String),

    /// A content pattern failed to compile
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Failure inside a running check
    #[error("Guardrail error: {0}")]
    Internal(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error from governance-core
    #[error(transparent)]
    Core(#[from] GovernanceError),

    /// Error from governance-telemetry
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

impl GuardrailError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a schema error
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        Self::Schema(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}
