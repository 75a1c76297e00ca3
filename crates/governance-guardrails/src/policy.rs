//! Guardrails policy documents
//!
//! Two dialects are accepted for the `guardrails` section:
//! - `canonical`: the shape of [`GuardrailsConfig`]
//! - `rules`: lists of typed rules (`input_guardrails`, `output_guardrails`,
//!   `action_guardrails`, `rate_limits`)
//!
//! A document may name its dialect with a `format` key; untagged documents
//! are classified by their keys. [`normalize`] maps either dialect onto
//! [`GuardrailsConfig`] and [`resolve`] runs the full pipeline: profile
//! defaults, normalization, optional `policy_file` overlay, validation.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::content_filter::CATEGORY_KEYWORDS;
use crate::profile::{deep_merge, GuardrailProfile};
use crate::{GuardrailError, GuardrailsConfig, Result};

const RULES_KEYS: [&str; 4] = [
    "input_guardrails",
    "output_guardrails",
    "action_guardrails",
    "rate_limits",
];

const DEFAULT_RULES_RPM: u32 = 10;

/// Dialect of a policy document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyFormat {
    Canonical,
    Rules,
}

impl PolicyFormat {
    /// Classify an untagged document by its keys
    pub fn detect(document: &Map<String, Value>) -> Self {
        if RULES_KEYS.iter().any(|key| document.contains_key(*key)) {
            Self::Rules
        } else {
            Self::Canonical
        }
    }
}

/// A guardrails section with its dialect made explicit
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDocument {
    /// Already in configuration shape; may carry `profile` and `policy_file`
    Canonical(Map<String, Value>),
    Rules(RulesPolicy),
}

/// Legacy rules dialect
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RulesPolicy {
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_guardrails: Vec<RuleSpec>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub output_guardrails: Vec<RuleSpec>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub action_guardrails: Vec<RuleSpec>,

    #[serde(default)]
    pub rate_limits: Option<RateLimitsRule>,

    #[serde(default, alias = "policy_path")]
    pub policy_file: Option<PathBuf>,
}

/// One rule of the rules dialect
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleSpec {
    PromptInjection,
    TopicFilter {
        #[serde(default)]
        disallowed_topics: Vec<String>,
    },
    ContentSafety,
    ToolAuthorization {
        #[serde(default)]
        allowed_tools: Vec<String>,
        #[serde(default)]
        disallowed_tools: Vec<String>,
    },
    ApprovalGate {
        #[serde(default)]
        actions: Vec<String>,
    },
    /// Rules enforced elsewhere (PII redaction) or unknown
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateLimitsRule {
    #[serde(default = "default_rules_rpm")]
    pub max_requests_per_minute: u32,
}

fn default_rules_rpm() -> u32 {
    DEFAULT_RULES_RPM
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl PolicyDocument {
    /// Parse a raw guardrails section
    pub fn from_value(value: Value) -> Result<Self> {
        let mut document = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(GuardrailError::config(format!(
                    "Guardrails policy must be a mapping, got {}",
                    other
                )))
            }
        };

        let format = match document.remove("format") {
            Some(tag) => serde_json::from_value(tag)
                .map_err(|e| GuardrailError::config(format!("Unknown policy format: {}", e)))?,
            None => PolicyFormat::detect(&document),
        };

        match format {
            PolicyFormat::Canonical => Ok(Self::Canonical(document)),
            PolicyFormat::Rules => {
                let rules = serde_json::from_value(Value::Object(document))
                    .map_err(|e| GuardrailError::config(format!("Invalid rules policy: {}", e)))?;
                Ok(Self::Rules(rules))
            }
        }
    }

    pub fn format(&self) -> PolicyFormat {
        match self {
            Self::Canonical(_) => PolicyFormat::Canonical,
            Self::Rules(_) => PolicyFormat::Rules,
        }
    }

    /// Policy file this document asks to be overlaid with
    pub fn policy_file(&self) -> Option<PathBuf> {
        match self {
            Self::Canonical(map) => map
                .get("policy_file")
                .or_else(|| map.get("policy_path"))
                .and_then(Value::as_str)
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            Self::Rules(rules) => rules.policy_file.clone(),
        }
    }

    /// Profile named by a canonical document; rules documents have none
    pub fn profile(&self) -> Result<Option<GuardrailProfile>> {
        match self {
            Self::Canonical(map) => match map.get("profile") {
                None | Some(Value::Null) => Ok(Some(GuardrailProfile::default())),
                Some(Value::String(name)) => name.parse().map(Some),
                Some(other) => Err(GuardrailError::config(format!(
                    "Guardrails profile must be a string, got {}",
                    other
                ))),
            },
            Self::Rules(_) => Ok(None),
        }
    }

    /// Configuration-shaped value holding only what the document sets
    pub fn into_canonical(self) -> Value {
        match self {
            Self::Canonical(map) => Value::Object(map),
            Self::Rules(rules) => rules.into_canonical(),
        }
    }
}

impl RulesPolicy {
    fn into_canonical(self) -> Value {
        let mut block_injection = false;
        let mut topics: Vec<String> = Vec::new();
        let mut categories: Vec<&str> = Vec::new();
        let mut policies = ToolPolicies::default();

        for rule in self.input_guardrails {
            match rule {
                RuleSpec::PromptInjection => block_injection = true,
                RuleSpec::TopicFilter { disallowed_topics } => topics.extend(disallowed_topics),
                _ => {}
            }
        }

        for rule in self.output_guardrails {
            if rule == RuleSpec::ContentSafety {
                categories = CATEGORY_KEYWORDS.iter().map(|(category, _)| *category).collect();
            }
        }

        for rule in self.action_guardrails {
            match rule {
                RuleSpec::ToolAuthorization {
                    allowed_tools,
                    disallowed_tools,
                } => {
                    for tool in allowed_tools {
                        policies.set(tool, "allowed", true);
                    }
                    for tool in disallowed_tools {
                        policies.set(tool, "allowed", false);
                    }
                }
                RuleSpec::ApprovalGate { actions } => {
                    for tool in actions {
                        policies.set(tool.clone(), "allowed", true);
                        policies.set(tool, "requires_confirmation", true);
                    }
                }
                _ => {}
            }
        }

        let mut content_safety = Map::new();
        content_safety.insert("enabled".into(), json!(true));
        content_safety.insert("block_categories".into(), json!(categories));
        if !topics.is_empty() {
            content_safety.insert("topic_blocklist".into(), json!(topics));
        }

        let mut rate_limiting = Map::new();
        rate_limiting.insert("enabled".into(), json!(true));
        if let Some(limits) = self.rate_limits {
            rate_limiting.insert("requests_per_minute_per_user".into(), json!(limits.max_requests_per_minute));
            rate_limiting.insert("requests_per_minute_global".into(), json!(limits.max_requests_per_minute));
        }

        let mut canonical = Map::new();
        canonical.insert("enabled".into(), json!(true));
        canonical.insert(
            "tools".into(),
            json!({"default_policy": {"allowed": false}, "policies": policies.into_values()}),
        );
        if block_injection {
            canonical.insert(
                "input_validation".into(),
                json!({"block_known_injection_patterns": true}),
            );
        }
        canonical.insert("content_safety".into(), Value::Object(content_safety));
        canonical.insert("rate_limiting".into(), Value::Object(rate_limiting));
        Value::Object(canonical)
    }
}

/// Tool policies of a rules document, one per tool in first-seen order
///
/// A tool named by several rules gets a single policy; each rule sets
/// only its own fields and later rules win.
#[derive(Default)]
struct ToolPolicies {
    entries: Vec<Map<String, Value>>,
}

impl ToolPolicies {
    fn set(&mut self, tool_name: String, field: &str, value: bool) {
        let index = match self
            .entries
            .iter()
            .position(|entry| entry.get("tool_name").and_then(Value::as_str) == Some(tool_name.as_str()))
        {
            Some(index) => index,
            None => {
                let mut entry = Map::new();
                entry.insert("tool_name".into(), Value::String(tool_name));
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };
        self.entries[index].insert(field.into(), Value::Bool(value));
    }

    fn into_values(self) -> Vec<Value> {
        self.entries.into_iter().map(Value::Object).collect()
    }
}

/// Map a policy document onto the canonical configuration
///
/// Pure: no profile defaults and no file access.
pub fn normalize(document: PolicyDocument) -> Result<GuardrailsConfig> {
    serde_json::from_value(document.into_canonical())
        .map_err(|e| GuardrailError::config(format!("Invalid guardrails policy: {}", e)))
}

/// Resolve a raw guardrails section into a validated configuration
pub fn resolve(section: &Value) -> Result<GuardrailsConfig> {
    resolve_with_policy_file(section, None)
}

/// Like [`resolve`], with a policy file that takes precedence over the
/// section's own `policy_file`
pub fn resolve_with_policy_file(section: &Value, policy_file: Option<&Path>) -> Result<GuardrailsConfig> {
    let document = PolicyDocument::from_value(section.clone())?;
    let overlay_path = policy_file.map(Path::to_path_buf).or_else(|| document.policy_file());

    let mut canonical = match document.profile()? {
        Some(profile) => deep_merge(profile.defaults(), document.into_canonical()),
        None => document.into_canonical(),
    };

    if let Some(path) = overlay_path {
        canonical = deep_merge(canonical, load_policy_file(&path)?);
        tracing::debug!("Applied guardrails policy file {}", path.display());
    }

    let config: GuardrailsConfig = serde_json::from_value(canonical)
        .map_err(|e| GuardrailError::config(format!("Invalid guardrails policy: {}", e)))?;
    config.validate()?;

    Ok(config)
}

/// Load a YAML policy file in either dialect, as a canonical overlay
pub fn load_policy_file(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|e| {
        GuardrailError::config(format!("Failed to read policy file {}: {}", path.display(), e))
    })?;
    let value: Value = serde_yaml::from_str(&text)?;
    Ok(PolicyDocument::from_value(value)?.into_canonical())
}
