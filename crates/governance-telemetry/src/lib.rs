//! Governance Telemetry
//!
//! Events describing guardrail decisions and cost accounting, and the
//! sinks they are delivered to.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use governance_telemetry::{BufferedEmitter, EventSink, MemorySink, TelemetryEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let memory = Arc::new(MemorySink::new());
//!     let emitter = BufferedEmitter::spawn(memory.clone(), 1000).unwrap();
//!
//!     let ctx = governance_core::RequestContext::anonymous();
//!     emitter
//!         .emit(TelemetryEvent::decision(&ctx, "guardrail_check_input", "block", "max_input_length", "too long"))
//!         .unwrap();
//!
//!     emitter.shutdown().await;
//!     assert_eq!(memory.len(), 1);
//! }
//! ```

pub mod emitter;
pub mod error;
pub mod event;
pub mod redaction;
pub mod sink;

// Re-exports
pub use emitter::{BufferedEmitter, EmitterStats};
pub use error::{Result, TelemetryError};
pub use event::TelemetryEvent;
pub use redaction::{redact_fields, REDACTED};
pub use sink::{CallbackSink, EventSink, MemorySink, TracingSink};

use serde::{Deserialize, Serialize};

/// Telemetry section of the governance config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Capacity of the buffered emitter
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Keys whose values are masked in event details
    #[serde(default)]
    pub redact_fields: Vec<String>,
}

fn default_buffer_size() -> usize {
    1000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            redact_fields: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.buffer_size, 1000);
        assert!(config.redact_fields.is_empty());
    }

    #[test]
    fn test_config_from_json() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"redact_fields": ["api_key"]}"#).unwrap();
        assert_eq!(config.buffer_size, 1000);
        assert_eq!(config.redact_fields, vec!["api_key".to_string()]);
    }
}
