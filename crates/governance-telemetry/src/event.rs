//! Telemetry event types

use chrono::{DateTime, Utc};
use governance_core::RequestContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events emitted by the governance layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// A guardrail check produced a non-allow verdict
    GuardrailDecision {
        event_name: String,
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id_hash: Option<String>,
        action: String,
        rule_name: String,
        reason: String,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        details: Value,
        timestamp: DateTime<Utc>,
    },

    /// An LLM call was priced and added to the running totals
    CostRecorded {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        model: String,
        input_tokens: u64,
        output_tokens: u64,
        estimated_usd: f64,
        request_total_usd: f64,
        session_total_usd: f64,
        timestamp: DateTime<Utc>,
    },
}

impl TelemetryEvent {
    /// Build a decision event for a request
    pub fn decision(
        ctx: &RequestContext,
        event_name: impl Into<String>,
        action: impl Into<String>,
        rule_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::GuardrailDecision {
            event_name: event_name.into(),
            request_id: ctx.request_id.clone(),
            session_id: ctx.session_id.clone(),
            user_id_hash: ctx.user_id_hash.clone(),
            action: action.into(),
            rule_name: rule_name.into(),
            reason: reason.into(),
            details: Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Build a cost event for one priced LLM call
    pub fn cost_recorded(
        ctx: &RequestContext,
        model: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        estimated_usd: f64,
        request_total_usd: f64,
        session_total_usd: f64,
    ) -> Self {
        Self::CostRecorded {
            request_id: ctx.request_id.clone(),
            session_id: ctx.session_id.clone(),
            model: model.into(),
            input_tokens,
            output_tokens,
            estimated_usd,
            request_total_usd,
            session_total_usd,
            timestamp: Utc::now(),
        }
    }

    /// Attach diagnostic details to a decision event
    ///
    /// Has no effect on other event kinds.
    pub fn with_details(mut self, value: Value) -> Self {
        if let Self::GuardrailDecision { details, .. } = &mut self {
            *details = value;
        }
        self
    }

    /// Request the event belongs to
    pub fn request_id(&self) -> &str {
        match self {
            Self::GuardrailDecision { request_id, .. } => request_id,
            Self::CostRecorded { request_id, .. } => request_id,
        }
    }

    /// Get the timestamp of this event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::GuardrailDecision { timestamp, .. } => timestamp,
            Self::CostRecorded { timestamp, .. } => timestamp,
        }
    }

    /// Short name used as the log message for this event
    pub fn name(&self) -> &str {
        match self {
            Self::GuardrailDecision { event_name, .. } => event_name,
            Self::CostRecorded { .. } => "cost_recorded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_copies_context() {
        let ctx = RequestContext::new(Some("alice"), Some("sess-9".to_string()));
        let event = TelemetryEvent::decision(&ctx, "guardrail_check_tool", "block", "circuit_open", "open");

        assert_eq!(event.request_id(), ctx.request_id);
        assert_eq!(event.name(), "guardrail_check_tool");
        match event {
            TelemetryEvent::GuardrailDecision { session_id, user_id_hash, .. } => {
                assert_eq!(session_id.as_deref(), Some("sess-9"));
                assert_eq!(user_id_hash, ctx.user_id_hash);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_serialized_shape() {
        let ctx = RequestContext::anonymous();
        let event = TelemetryEvent::decision(&ctx, "guardrail_check_input", "block", "injection_pattern", "matched")
            .with_details(serde_json::json!({"pattern": "ignore previous"}));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "guardrail_decision");
        assert_eq!(json["rule_name"], "injection_pattern");
        assert_eq!(json["details"]["pattern"], "ignore previous");
        assert!(json.get("session_id").is_none());
    }

    #[test]
    fn test_with_details_ignores_cost_events() {
        let ctx = RequestContext::new(None, Some("s".to_string()));
        let event = TelemetryEvent::cost_recorded(&ctx, "m", 1, 1, 0.0, 0.0, 0.0)
            .with_details(serde_json::json!({"ignored": true}));

        assert_eq!(event.name(), "cost_recorded");
        assert_eq!(event.request_id(), ctx.request_id);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("details").is_none());
        assert_eq!(json["session_id"], "s");
    }
}
