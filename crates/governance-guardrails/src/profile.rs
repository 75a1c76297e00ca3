//! Guardrail profiles
//!
//! A profile is a named set of defaults. The configured guardrails
//! section is deep-merged over the profile's defaults, so a deployment
//! only spells out what it changes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::GuardrailError;

/// Named set of guardrail defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardrailProfile {
    /// Default deny for tools, every content category, tight rate limits
    #[default]
    Strict,
    /// Default allow for tools, most content categories
    Balanced,
    /// No content categories, no injection blocking, high rate limits
    Permissive,
    /// No defaults beyond the struct defaults
    Custom,
}

impl GuardrailProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Balanced => "balanced",
            Self::Permissive => "permissive",
            Self::Custom => "custom",
        }
    }

    /// Defaults this profile contributes, in configuration shape
    pub fn defaults(&self) -> Value {
        match self {
            Self::Strict => json!({
                "enabled": true,
                "input_validation": {"block_known_injection_patterns": true},
                "content_safety": {
                    "enabled": true,
                    "block_categories": ["harassment", "hate_speech", "violence", "self_harm", "sexual_content"],
                    "topic_blocklist": ["illegal_acts", "sexual_content", "competitor_data", "PII_extraction"],
                },
                "tools": {
                    "default_policy": {"allowed": false},
                    "policies": [
                        {"tool_name": "search_internal_kb", "allowed": true},
                        {"tool_name": "read_read_only_db", "allowed": true},
                        {"tool_name": "execute_shell", "allowed": false},
                        {"tool_name": "delete_file", "allowed": false},
                        {"tool_name": "write_to_prod_db", "allowed": false},
                        {"tool_name": "email_user", "allowed": true, "requires_confirmation": true},
                        {"tool_name": "update_customer_record", "allowed": true, "requires_confirmation": true},
                    ],
                },
                "rate_limiting": {
                    "enabled": true,
                    "requests_per_minute_per_user": 10,
                    "requests_per_minute_global": 10,
                },
            }),
            Self::Balanced => json!({
                "enabled": true,
                "input_validation": {"block_known_injection_patterns": true},
                "content_safety": {
                    "enabled": true,
                    "block_categories": ["harassment", "hate_speech", "violence", "self_harm"],
                },
                "tools": {"default_policy": {"allowed": true}},
                "rate_limiting": {
                    "enabled": true,
                    "requests_per_minute_per_user": 60,
                    "requests_per_minute_global": 300,
                },
            }),
            Self::Permissive => json!({
                "enabled": true,
                "input_validation": {"block_known_injection_patterns": false},
                "content_safety": {"enabled": true, "block_categories": []},
                "tools": {"default_policy": {"allowed": true}},
                "rate_limiting": {
                    "enabled": true,
                    "requests_per_minute_per_user": 300,
                    "requests_per_minute_global": 1000,
                },
            }),
            Self::Custom => json!({}),
        }
    }
}

impl fmt::Display for GuardrailProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for GuardrailProfile {
    type Err = GuardrailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "balanced" => Ok(Self::Balanced),
            "permissive" => Ok(Self::Permissive),
            "custom" => Ok(Self::Custom),
            other => Err(GuardrailError::config(format!(
                "Unsupported guardrails profile: {}",
                other
            ))),
        }
    }
}

/// Merge `overlay` into `base`
///
/// Objects merge key by key, recursively. Any other overlay value,
/// arrays included, replaces the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}
