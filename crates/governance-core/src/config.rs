//! Configuration loading for the governance crates
//!
//! Documents are layered from two sources:
//! - A configuration file (YAML, JSON or TOML, picked by extension)
//! - Environment variables with the `GOV_` prefix, using `__` to reach
//!   nested keys (`GOV_GUARDRAILS__RATE_LIMITING__ENABLED=false`)
//!
//! The loader is generic so each crate can deserialize the sections it
//! owns without this crate knowing their shape.

use crate::error::{GovernanceError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Deployment environment of the governed agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Staging,
    #[serde(alias = "production")]
    Prod,
}

/// Kind of runtime hosting the governed agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Adk,
    AgentBuilder,
    VertexEndpoint,
    #[default]
    Custom,
}

/// Identity of the agent a governance config applies to
///
/// Every field defaults so that a partially filled document still
/// loads; the deployment gate in the CLI reports what is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    #[serde(default)]
    pub agent_id: String,

    #[serde(default)]
    pub agent_name: String,

    #[serde(default)]
    pub agent_type: AgentType,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub env: Environment,

    /// Cloud project the agent is deployed into
    #[serde(default)]
    pub gcp_project: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

fn default_region() -> String {
    "us-central1".to_string()
}

impl Default for AgentIdentity {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            agent_name: String::new(),
            agent_type: AgentType::default(),
            version: String::new(),
            env: Environment::default(),
            gcp_project: String::new(),
            region: default_region(),
            service_account: None,
        }
    }
}

impl AgentIdentity {
    /// Key identifying one deployment of this agent (`id:env:version`)
    pub fn deployment_key(&self) -> String {
        let env = match self.env {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        };
        format!("{}:{}:{}", self.agent_id, env, self.version)
    }
}

/// Load a document from a file, layered with environment overrides
///
/// # Example
///
/// ```no_run
/// use governance_core::{config::load_document, LoggingConfig};
///
/// let logging: LoggingConfig = load_document("logging.yaml", "GOV").unwrap();
/// println!("level: {}", logging.level);
/// ```
pub fn load_document<T, P>(path: P, env_prefix: &str) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Err(GovernanceError::config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let document: T = settings.try_deserialize()?;

    tracing::info!("Configuration loaded from {}", path.display());

    Ok(document)
}

/// Load a document, falling back to its defaults when loading fails
pub fn load_document_or_default<T, P>(path: P, env_prefix: &str) -> T
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    match load_document(path, env_prefix) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            T::default()
        }
    }
}
