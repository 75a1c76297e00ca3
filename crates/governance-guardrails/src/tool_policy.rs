//! Tool authorization
//!
//! Decides whether a tool may run: allow/deny lists, per-request call
//! caps, parameter value restrictions and human confirmation.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;

use crate::config::{ToolPolicy, ToolsConfig};
use crate::GuardrailResult;

/// Enforces tool policies
///
/// Policies are fixed at construction. The only mutable state is the
/// per-request call counters, which live until [`clear_request`] drops
/// them.
///
/// [`clear_request`]: ToolPolicyEnforcer::clear_request
pub struct ToolPolicyEnforcer {
    default_allowed: bool,
    policies: HashMap<String, ToolPolicy>,
    call_counts: DashMap<String, HashMap<String, u32>>,
}

impl ToolPolicyEnforcer {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            default_allowed: config.default_policy.allowed,
            policies: config
                .policies
                .iter()
                .map(|policy| (policy.tool_name.clone(), policy.clone()))
                .collect(),
            call_counts: DashMap::new(),
        }
    }

    /// Look up an explicit policy
    pub fn policy(&self, tool_name: &str) -> Option<&ToolPolicy> {
        self.policies.get(tool_name)
    }

    /// All explicit policies
    pub fn policies(&self) -> impl Iterator<Item = &ToolPolicy> {
        self.policies.values()
    }

    pub fn check_allowed(&self, tool_name: &str) -> GuardrailResult {
        match self.policies.get(tool_name) {
            None if self.default_allowed => {
                GuardrailResult::allow("default_allow", "Tool allowed by default policy")
            }
            None => GuardrailResult::block(
                "tool_not_in_allowlist",
                format!("Tool '{}' not in allowlist", tool_name),
            )
            .with_detail("tool", tool_name),
            Some(policy) if !policy.allowed => GuardrailResult::block(
                "tool_explicitly_blocked",
                format!("Tool '{}' is blocked by policy", tool_name),
            )
            .with_detail("tool", tool_name),
            Some(_) => GuardrailResult::allow("tool_in_allowlist", "Tool allowed by policy"),
        }
    }

    /// Count this attempt and compare against the tool's cap
    ///
    /// Every attempt on a capped tool counts, including those that end up
    /// blocked, so the reported attempt number keeps rising on retries.
    pub fn check_call_limit(&self, request_id: &str, tool_name: &str) -> GuardrailResult {
        let max = match self.policies.get(tool_name).and_then(|p| p.max_calls_per_request) {
            Some(max) if max > 0 => max,
            _ => return GuardrailResult::allow("no_call_limit", "No call limit configured"),
        };

        let count = {
            let mut counts = self.call_counts.entry(request_id.to_string()).or_default();
            let count = counts.entry(tool_name.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };

        if count > max {
            return GuardrailResult::block(
                "tool_call_limit_exceeded",
                format!(
                    "Tool '{}' exceeded max {} calls per request (attempted call #{})",
                    tool_name, max, count
                ),
            )
            .with_detail("max_calls", max)
            .with_detail("attempt", count);
        }

        GuardrailResult::allow("within_call_limit", format!("Call {}/{}", count, max))
    }

    /// Check parameter values against the tool's blocked and allowed sets
    ///
    /// Values are compared by their string form: JSON strings as-is,
    /// anything else rendered as JSON. Parameters absent from `params`
    /// are not checked.
    pub fn check_params(&self, tool_name: &str, params: &Value) -> GuardrailResult {
        let Some(policy) = self.policies.get(tool_name) else {
            return GuardrailResult::allow("no_param_policy", "No parameter policy");
        };

        for (param, blocked) in &policy.blocked_params {
            if let Some(value) = params.get(param) {
                let value = param_value_string(value);
                if blocked.contains(&value) {
                    return GuardrailResult::block(
                        "blocked_param_value",
                        format!("Parameter '{}' has blocked value", param),
                    )
                    .with_detail("param", param.as_str());
                }
            }
        }

        for (param, allowed) in &policy.allowed_params {
            if let Some(value) = params.get(param) {
                let value = param_value_string(value);
                if !allowed.contains(&value) {
                    return GuardrailResult::block(
                        "param_not_in_allowlist",
                        format!("Parameter '{}' value not in allowlist", param),
                    )
                    .with_detail("param", param.as_str());
                }
            }
        }

        GuardrailResult::allow("params_valid", "Parameters valid")
    }

    pub fn check_confirmation_required(&self, tool_name: &str) -> GuardrailResult {
        match self.policies.get(tool_name) {
            Some(policy) if policy.requires_confirmation => GuardrailResult::confirm(
                "confirmation_required",
                format!("Tool '{}' requires confirmation", tool_name),
            )
            .with_detail("tool", tool_name),
            _ => GuardrailResult::allow("no_confirmation", "No confirmation required"),
        }
    }

    /// Drop all call counters of a request; idempotent
    pub fn clear_request(&self, request_id: &str) {
        self.call_counts.remove(request_id);
    }

    /// Attempts recorded for a tool within a request
    pub fn call_count(&self, request_id: &str, tool_name: &str) -> u32 {
        self.call_counts
            .get(request_id)
            .and_then(|counts| counts.get(tool_name).copied())
            .unwrap_or(0)
    }

    /// Number of requests with live call counters
    pub fn pending_requests(&self) -> usize {
        self.call_counts.len()
    }
}

fn param_value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
