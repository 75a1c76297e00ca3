//! Process-wide governance context
//!
//! A host loads one [`GovernanceConfig`] at startup, builds a
//! [`Governance`] from it and passes that by reference to whatever needs
//! the engine. Nothing here is global.

use governance_core::{load_document, AgentIdentity, LoggingConfig, ENV_PREFIX};
use governance_telemetry::{BufferedEmitter, EmitterStats, EventSink, TelemetryConfig, TracingSink};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::{policy, GuardrailsConfig, GuardrailsEngine, Result};

/// Top-level governance document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub agent: AgentIdentity,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Raw guardrails section; see [`crate::policy`]
    #[serde(default)]
    pub guardrails: Value,
}

impl GovernanceConfig {
    /// Load a document, applying `GOV_` environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(load_document(path, ENV_PREFIX)?)
    }

    /// Whether the document has a guardrails section at all
    pub fn has_guardrails_section(&self) -> bool {
        !self.guardrails.is_null()
    }

    /// Resolve the guardrails section into a validated configuration
    pub fn guardrails(&self) -> Result<GuardrailsConfig> {
        policy::resolve(&self.guardrails)
    }
}

/// Everything a host needs to enforce governance
pub struct Governance {
    config: GovernanceConfig,
    guardrails: GuardrailsConfig,
    engine: GuardrailsEngine,
    emitter: Arc<BufferedEmitter>,
}

impl Governance {
    /// Build the engine and its buffered event pipeline
    ///
    /// Must be called from within a tokio runtime; events are delivered
    /// to a [`TracingSink`] by a background task.
    pub fn from_config(config: GovernanceConfig) -> Result<Self> {
        Self::with_sink(config, Arc::new(TracingSink::new()))
    }

    /// Like [`from_config`](Self::from_config), delivering events to `sink`
    pub fn with_sink(config: GovernanceConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let guardrails = config.guardrails()?;
        let emitter = Arc::new(BufferedEmitter::spawn(sink, config.telemetry.buffer_size)?);

        let engine = GuardrailsEngine::new(&guardrails)?
            .with_sink(emitter.clone())
            .with_redacted_fields(config.telemetry.redact_fields.iter().cloned());

        tracing::info!(
            agent_id = %config.agent.agent_id,
            deployment = %config.agent.deployment_key(),
            "Governance initialized"
        );

        Ok(Self {
            config,
            guardrails,
            engine,
            emitter,
        })
    }

    pub fn engine(&self) -> &GuardrailsEngine {
        &self.engine
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// The resolved guardrails policy the engine was built from
    pub fn guardrails(&self) -> &GuardrailsConfig {
        &self.guardrails
    }

    pub fn telemetry_stats(&self) -> EmitterStats {
        self.emitter.stats()
    }

    /// Flush queued events; the engine keeps checking but stops reporting
    pub async fn shutdown(&self) {
        self.emitter.shutdown().await;
    }
}
