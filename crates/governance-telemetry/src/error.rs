//! Error types for telemetry delivery

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while delivering telemetry
///
/// None of these are allowed to fail a guardrail check; callers log and
/// move on.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// A sink rejected or failed to deliver an event
    #[error("Sink error: {0}")]
    Sink(String),

    /// The emitter has been shut down
    #[error("Emitter closed")]
    Closed,

    /// Event could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TelemetryError {
    /// Create a sink error
    pub fn sink<S: Into<String>>(msg: S) -> Self {
        Self::Sink(msg.into())
    }
}
