//! Configuration for guardrails
//!
//! [`GuardrailsConfig`] is the canonical, validated policy object the
//! engine is built from. Raw configuration sections reach it through
//! [`crate::policy::resolve`], which applies profiles and the legacy
//! rules dialect first.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use crate::{GuardrailError, Result};

/// Configuration for the guardrail system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    /// Global kill-switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub input_validation: InputValidationConfig,

    #[serde(default)]
    pub output_validation: OutputValidationConfig,

    #[serde(default)]
    pub content_safety: ContentSafetyConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Registry-wide breaker defaults
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// YAML file holding input, output and tool parameter schemas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_schema_file: Option<PathBuf>,

    #[serde(default)]
    pub cost: CostConfig,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            input_validation: InputValidationConfig::default(),
            output_validation: OutputValidationConfig::default(),
            content_safety: ContentSafetyConfig::default(),
            tools: ToolsConfig::default(),
            rate_limiting: RateLimitingConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            model_schema_file: None,
            cost: CostConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Input validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputValidationConfig {
    /// Maximum input length in characters
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,

    /// Maximum number of whitespace-delimited tokens
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    #[serde(default = "default_true")]
    pub block_known_injection_patterns: bool,

    /// File with one injection pattern per line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection_patterns_file: Option<PathBuf>,

    /// Inline injection patterns, combined with the file
    #[serde(default)]
    pub injection_patterns: Vec<String>,
}

fn default_max_input_length() -> usize {
    10_000
}

fn default_max_input_tokens() -> usize {
    4096
}

impl Default for InputValidationConfig {
    fn default() -> Self {
        Self {
            max_input_length: default_max_input_length(),
            max_input_tokens: default_max_input_tokens(),
            block_known_injection_patterns: true,
            injection_patterns_file: None,
            injection_patterns: Vec::new(),
        }
    }
}

/// Output validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputValidationConfig {
    /// Maximum output length in characters
    #[serde(default = "default_max_output_length")]
    pub max_output_length: usize,
}

fn default_max_output_length() -> usize {
    20_000
}

impl Default for OutputValidationConfig {
    fn default() -> Self {
        Self {
            max_output_length: default_max_output_length(),
        }
    }
}

/// Content safety configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSafetyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Categories from the built-in keyword table
    #[serde(default)]
    pub block_categories: Vec<String>,

    #[serde(default)]
    pub topic_blocklist: Vec<String>,

    #[serde(default)]
    pub keyword_blocklist: Vec<String>,

    /// Blocked regex patterns
    #[serde(default)]
    pub blocked_patterns: Vec<String>,
}

impl Default for ContentSafetyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            block_categories: Vec::new(),
            topic_blocklist: Vec::new(),
            keyword_blocklist: Vec::new(),
            blocked_patterns: Vec::new(),
        }
    }
}

/// Policy applied to tools without an explicit entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultToolPolicy {
    #[serde(default)]
    pub allowed: bool,
}

/// Per-tool policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPolicy {
    pub tool_name: String,

    #[serde(default = "default_true")]
    pub allowed: bool,

    #[serde(default)]
    pub requires_confirmation: bool,

    /// `None` or zero means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_calls_per_request: Option<u32>,

    /// Parameter name to forbidden values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocked_params: BTreeMap<String, Vec<String>>,

    /// Parameter name to the only accepted values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allowed_params: BTreeMap<String, Vec<String>>,

    /// Overrides `circuit_breaker.max_failures` for this tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_threshold: Option<u32>,
}

impl ToolPolicy {
    /// Allowed tool with no further restrictions
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            allowed: true,
            requires_confirmation: false,
            max_calls_per_request: None,
            blocked_params: BTreeMap::new(),
            allowed_params: BTreeMap::new(),
            circuit_breaker_threshold: None,
        }
    }

    /// Explicitly blocked tool
    pub fn blocked(tool_name: impl Into<String>) -> Self {
        Self {
            allowed: false,
            ..Self::new(tool_name)
        }
    }

    pub fn with_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn with_max_calls(mut self, max: u32) -> Self {
        self.max_calls_per_request = Some(max);
        self
    }

    pub fn with_blocked_values<I, S>(mut self, param: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_params
            .insert(param.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_allowed_values<I, S>(mut self, param: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_params
            .insert(param.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = Some(threshold);
        self
    }
}

/// Tool authorization configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub default_policy: DefaultToolPolicy,

    #[serde(default)]
    pub policies: Vec<ToolPolicy>,
}

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_user_rpm")]
    pub requests_per_minute_per_user: usize,

    #[serde(default = "default_global_rpm")]
    pub requests_per_minute_global: usize,

    /// Length of the sliding window in seconds
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

fn default_user_rpm() -> usize {
    60
}

fn default_global_rpm() -> usize {
    300
}

fn default_window_seconds() -> u64 {
    60
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute_per_user: default_user_rpm(),
            requests_per_minute_global: default_global_rpm(),
            window_seconds: default_window_seconds(),
        }
    }
}

impl RateLimitingConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a breaker
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Seconds an open breaker waits before closing again
    #[serde(default = "default_reset_seconds")]
    pub reset_seconds: u64,
}

fn default_max_failures() -> u32 {
    5
}

fn default_reset_seconds() -> u64 {
    60
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            reset_seconds: default_reset_seconds(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn reset_after(&self) -> Duration {
        Duration::from_secs(self.reset_seconds)
    }
}

/// USD price per million tokens for one model
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    #[serde(default)]
    pub input: f64,

    #[serde(default)]
    pub output: f64,
}

/// Cost tracking configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Pricing keyed by model name
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,

    /// Request total above which a warning event is emitted; zero disables
    #[serde(default)]
    pub alert_threshold_usd: f64,
}

impl GuardrailsConfig {
    /// Reject policies the engine cannot enforce consistently
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for policy in &self.tools.policies {
            if policy.tool_name.trim().is_empty() {
                return Err(GuardrailError::config("Tool policy with empty tool_name"));
            }
            if !seen.insert(policy.tool_name.as_str()) {
                return Err(GuardrailError::config(format!(
                    "Duplicate tool policy for '{}'",
                    policy.tool_name
                )));
            }
            if policy.circuit_breaker_threshold == Some(0) {
                return Err(GuardrailError::config(format!(
                    "circuit_breaker_threshold for '{}' must be at least 1",
                    policy.tool_name
                )));
            }
        }

        if self.rate_limiting.enabled && self.rate_limiting.window_seconds == 0 {
            return Err(GuardrailError::config("rate_limiting.window_seconds must be at least 1"));
        }

        if self.circuit_breaker.max_failures == 0 {
            return Err(GuardrailError::config("circuit_breaker.max_failures must be at least 1"));
        }

        if self.cost.alert_threshold_usd < 0.0 {
            return Err(GuardrailError::config("cost.alert_threshold_usd must not be negative"));
        }

        Ok(())
    }

    /// Look up an explicit tool policy
    pub fn tool_policy(&self, tool_name: &str) -> Option<&ToolPolicy> {
        self.tools.policies.iter().find(|p| p.tool_name == tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GuardrailsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.input_validation.max_input_length, 10_000);
        assert_eq!(config.input_validation.max_input_tokens, 4096);
        assert_eq!(config.output_validation.max_output_length, 20_000);
        assert!(!config.tools.default_policy.allowed);
        assert_eq!(config.rate_limiting.requests_per_minute_per_user, 60);
        assert_eq!(config.rate_limiting.requests_per_minute_global, 300);
        assert_eq!(config.circuit_breaker.max_failures, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: GuardrailsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GuardrailsConfig::default());
    }

    #[test]
    fn test_tool_policy_defaults() {
        let policy: ToolPolicy = serde_json::from_str(r#"{"tool_name": "search"}"#).unwrap();
        assert_eq!(policy, ToolPolicy::new("search"));
        assert!(policy.allowed);
        assert!(policy.max_calls_per_request.is_none());
    }

    #[test]
    fn test_tool_policy_from_yaml() {
        let yaml = r#"
tool_name: write_to_prod_db
allowed: true
requires_confirmation: true
max_calls_per_request: 2
blocked_params:
  table: [users, payments]
circuit_breaker_threshold: 3
"#;
        let policy: ToolPolicy = serde_yaml::from_str(yaml).unwrap();
        assert!(policy.requires_confirmation);
        assert_eq!(policy.max_calls_per_request, Some(2));
        assert_eq!(policy.blocked_params["table"], vec!["users", "payments"]);
        assert_eq!(policy.circuit_breaker_threshold, Some(3));
    }

    #[test]
    fn test_duplicate_policies_rejected() {
        let mut config = GuardrailsConfig::default();
        config.tools.policies = vec![ToolPolicy::new("search"), ToolPolicy::blocked("search")];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate tool policy"));
    }

    #[test]
    fn test_zero_thresholds_rejected() {
        let mut config = GuardrailsConfig::default();
        config.circuit_breaker.max_failures = 0;
        assert!(config.validate().is_err());

        let mut config = GuardrailsConfig::default();
        config.tools.policies = vec![ToolPolicy::new("t").with_breaker_threshold(0)];
        assert!(config.validate().is_err());

        let mut config = GuardrailsConfig::default();
        config.rate_limiting.window_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tool_policy_lookup() {
        let mut config = GuardrailsConfig::default();
        config.tools.policies = vec![ToolPolicy::new("search").with_max_calls(2)];

        assert_eq!(config.tool_policy("search").unwrap().max_calls_per_request, Some(2));
        assert!(config.tool_policy("delete_file").is_none());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = GuardrailsConfig::default();
        config.content_safety.block_categories = vec!["harassment".to_string()];
        config.content_safety.blocked_patterns = vec![r"\d{3}-\d{2}-\d{4}".to_string()];

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: GuardrailsConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, config);
    }
}
