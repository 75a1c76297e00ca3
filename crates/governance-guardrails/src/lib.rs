//! Guardrails System
//!
//! Policy enforcement around an agent's request lifecycle: user input,
//! tool calls and model output pass through a [`GuardrailsEngine`] that
//! fails closed.
//!
//! # Example
//!
//! ```
//! use governance_core::RequestContext;
//! use governance_guardrails::{GuardrailsConfig, GuardrailsEngine, ToolPolicy};
//!
//! let mut config = GuardrailsConfig::default();
//! config.tools.policies.push(ToolPolicy::new("search").with_max_calls(2));
//!
//! let engine = GuardrailsEngine::new(&config).unwrap();
//! let ctx = RequestContext::new(Some("user-42"), None);
//!
//! assert!(engine.check_input(&ctx, "What's our refund policy?").is_allowed());
//! assert!(engine.check_tool_call(&ctx, "search", &serde_json::json!({})).is_allowed());
//! assert!(engine.check_tool_call(&ctx, "delete_file", &serde_json::json!({})).should_block());
//!
//! engine.complete_request(&ctx);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod policy;
pub mod profile;
pub mod result;
pub mod runtime;

// Built-in guardrails
pub mod circuit_breaker;
pub mod content_filter;
pub mod cost_tracker;
pub mod input_validator;
pub mod output_validator;
pub mod rate_limiter;
pub mod schema;
pub mod tool_policy;

// Re-exports
pub use config::{GuardrailsConfig, ToolPolicy};
pub use engine::{EngineSnapshot, GuardrailsEngine};
pub use error::{GuardrailError, Result};
pub use policy::{normalize, resolve, PolicyDocument, PolicyFormat};
pub use profile::GuardrailProfile;
pub use result::{GuardrailAction, GuardrailResult};
pub use runtime::{Governance, GovernanceConfig};

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerRegistry};
pub use content_filter::ContentFilter;
pub use cost_tracker::{CostTotals, CostTracker, CostUsage};
pub use input_validator::InputValidator;
pub use output_validator::OutputValidator;
pub use rate_limiter::RateLimiter;
pub use schema::{ModelSchemaValidator, PayloadValidator};
pub use tool_policy::ToolPolicyEnforcer;
