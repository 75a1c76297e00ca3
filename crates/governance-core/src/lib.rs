//! Governance Core
//!
//! Shared building blocks for the governance crates: the error type,
//! layered configuration loading, logging setup and the per-turn
//! [`RequestContext`] that every guardrail call is correlated with.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{load_document, AgentIdentity, AgentType, Environment, LoggingConfig};
pub use context::RequestContext;
pub use error::{GovernanceError, Result};
pub use logging::init_logging;

/// Default config file looked up by the loaders and the CLI.
pub const DEFAULT_CONFIG_PATH: &str = "governance.yaml";

/// Environment variable prefix for config overrides (`GOV_SECTION__KEY`).
pub const ENV_PREFIX: &str = "GOV";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_functionality() {
        let identity = AgentIdentity::default();
        assert_eq!(identity.region, "us-central1");
        assert_eq!(ENV_PREFIX, "GOV");
    }
}
