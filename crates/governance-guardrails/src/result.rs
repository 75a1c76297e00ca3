//! Guardrail verdicts

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Verdict of a guardrail check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardrailAction {
    /// Proceed
    Allow,
    /// Stop the request
    Block,
    /// Proceed with sensitive content masked
    Redact,
    /// Proceed, but record the finding
    Warn,
    /// Hold until a human approves
    Confirm,
}

impl GuardrailAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
            Self::Redact => "redact",
            Self::Warn => "warn",
            Self::Confirm => "confirm",
        }
    }
}

impl fmt::Display for GuardrailAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one guardrail check
///
/// Built once by the check that produced it and never modified after it
/// is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailResult {
    /// What the caller should do
    pub action: GuardrailAction,

    /// Identifier of the rule that produced the verdict
    pub rule_name: String,

    /// Human-readable description
    pub reason: String,

    /// Diagnostic data (matched pattern, schema errors, counters)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl GuardrailResult {
    /// Create a result with an arbitrary action
    pub fn new(action: GuardrailAction, rule_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action,
            rule_name: rule_name.into(),
            reason: reason.into(),
            details: Map::new(),
        }
    }

    pub fn allow(rule_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(GuardrailAction::Allow, rule_name, reason)
    }

    pub fn block(rule_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(GuardrailAction::Block, rule_name, reason)
    }

    pub fn confirm(rule_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(GuardrailAction::Confirm, rule_name, reason)
    }

    pub fn warn(rule_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(GuardrailAction::Warn, rule_name, reason)
    }

    /// Add one diagnostic entry
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Check if the request may continue unchanged
    pub fn is_allowed(&self) -> bool {
        self.action == GuardrailAction::Allow
    }

    /// Check if this result should block execution
    pub fn should_block(&self) -> bool {
        matches!(self.action, GuardrailAction::Block)
    }

    /// Check if a human has to approve before the call proceeds
    pub fn needs_confirmation(&self) -> bool {
        matches!(self.action, GuardrailAction::Confirm)
    }
}
