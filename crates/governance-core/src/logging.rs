//! Logging setup for governance hosts
//!
//! Structured logging through `tracing`. Guardrail decisions are logged
//! with fields (`rule`, `action`, `request_id`) so the JSON layer yields
//! records that can be queried directly.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{GovernanceError, Result};

/// Initialize logging for the host process
///
/// `RUST_LOG` takes precedence over the configured level. Should be
/// called once at startup; a second call returns an error instead of
/// replacing the installed subscriber.
///
/// # Example
///
/// ```
/// use governance_core::{init_logging, LoggingConfig};
///
/// let config = LoggingConfig {
///     level: "debug".to_string(),
///     json: false,
/// };
/// init_logging(&config).ok();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = if config.json {
        // JSON format for production/structured logging
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };

    installed.map_err(|e| GovernanceError::other(format!("Logging already initialized: {}", e)))?;

    tracing::info!(level = %config.level, json = config.json, "Logging initialized");
    Ok(())
}
