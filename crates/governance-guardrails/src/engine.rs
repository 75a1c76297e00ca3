//! Guardrails engine
//!
//! Runs the guardrail checks as three short-circuiting pipelines:
//!
//! - input: rate limit, length, injection, input schema, content safety
//! - tool call: allowlist, call limit, parameters, parameter schema,
//!   circuit breaker, confirmation
//! - output: length, output schema, content safety
//!
//! The first non-allow result ends a pipeline. Errors and panics inside a
//! pipeline become a `guardrail_error` block; nothing escapes to the
//! caller. Every non-allow result is reported to the event sink.

use governance_core::RequestContext;
use governance_telemetry::{redact_fields, EventSink, TelemetryEvent, TracingSink};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::circuit_breaker::{BreakerSnapshot, CircuitBreakerRegistry};
use crate::content_filter::ContentFilter;
use crate::cost_tracker::{CostTotals, CostTracker};
use crate::input_validator::InputValidator;
use crate::output_validator::OutputValidator;
use crate::rate_limiter::RateLimiter;
use crate::schema::{ModelSchemaValidator, PayloadValidator};
use crate::tool_policy::ToolPolicyEnforcer;
use crate::{GuardrailAction, GuardrailResult, GuardrailsConfig, Result};

pub const EVENT_CHECK_INPUT: &str = "guardrail_check_input";
pub const EVENT_CHECK_TOOL: &str = "guardrail_check_tool";
pub const EVENT_CHECK_OUTPUT: &str = "guardrail_check_output";
pub const EVENT_COST_ALERT: &str = "cost_threshold_exceeded";

/// Return from the pipeline unless the check allowed the request
macro_rules! ensure_allowed {
    ($check:expr) => {{
        let result = $check;
        if !result.is_allowed() {
            return Ok(result);
        }
    }};
}

/// Mutable engine state at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    /// Recorded calls per rate limit bucket
    pub rate_buckets: BTreeMap<String, usize>,
    pub breakers: BTreeMap<String, BreakerSnapshot>,
    /// Requests with live tool call counters
    pub pending_requests: usize,
}

/// Guardrails engine
///
/// One instance is shared by every in-flight request. Check methods take
/// `&self`; each piece of mutable state has its own locks.
pub struct GuardrailsEngine {
    enabled: bool,
    rate_limiter: RateLimiter,
    input_validator: InputValidator,
    output_validator: OutputValidator,
    content_filter: ContentFilter,
    schema_validator: Arc<dyn PayloadValidator>,
    tool_policy: ToolPolicyEnforcer,
    circuit_breakers: CircuitBreakerRegistry,
    cost_tracker: CostTracker,
    sink: Arc<dyn EventSink>,
    redacted_fields: Vec<String>,
}

impl GuardrailsEngine {
    /// Build an engine from a resolved configuration
    ///
    /// Loads the injection pattern and schema files and compiles content
    /// patterns; any failure is a configuration error. Events go to a
    /// [`TracingSink`] until [`with_sink`](Self::with_sink) replaces it.
    pub fn new(config: &GuardrailsConfig) -> Result<Self> {
        config.validate()?;

        let schema_validator: Arc<dyn PayloadValidator> = match &config.model_schema_file {
            Some(path) => Arc::new(ModelSchemaValidator::from_file(path)?),
            None => Arc::new(ModelSchemaValidator::empty()),
        };

        let engine = Self {
            enabled: config.enabled,
            rate_limiter: RateLimiter::from_config(&config.rate_limiting),
            input_validator: InputValidator::from_config(&config.input_validation)?,
            output_validator: OutputValidator::from_config(&config.output_validation),
            content_filter: ContentFilter::from_config(&config.content_safety)?,
            schema_validator,
            tool_policy: ToolPolicyEnforcer::new(&config.tools),
            circuit_breakers: CircuitBreakerRegistry::from_policies(
                &config.tools.policies,
                &config.circuit_breaker,
            ),
            cost_tracker: CostTracker::new(&config.cost),
            sink: Arc::new(TracingSink::new()),
            redacted_fields: Vec::new(),
        };

        tracing::info!(
            enabled = engine.enabled,
            tool_policies = config.tools.policies.len(),
            injection_patterns = engine.input_validator.patterns().len(),
            content_safety = engine.content_filter.is_active(),
            rate_limiting = engine.rate_limiter.is_enabled(),
            "Guardrails engine initialized"
        );

        Ok(engine)
    }

    /// Send decision and cost events to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the schema validator built from `model_schema_file`
    pub fn with_schema_validator(mut self, validator: Arc<dyn PayloadValidator>) -> Self {
        self.schema_validator = validator;
        self
    }

    /// Mask these keys in event details before emission
    pub fn with_redacted_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redacted_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn tool_policy(&self) -> &ToolPolicyEnforcer {
        &self.tool_policy
    }

    pub fn circuit_breakers(&self) -> &CircuitBreakerRegistry {
        &self.circuit_breakers
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn cost_tracker(&self) -> &CostTracker {
        &self.cost_tracker
    }

    /// Check user input before it reaches the model
    pub fn check_input(&self, ctx: &RequestContext, text: &str) -> GuardrailResult {
        if !self.enabled {
            return disabled();
        }

        let result = fail_closed(|| self.input_pipeline(ctx, text));
        self.record_decision(ctx, EVENT_CHECK_INPUT, &result);
        result
    }

    /// Check a tool call the model wants to make
    ///
    /// A `confirm` result means the call may only proceed once a human
    /// has approved it.
    pub fn check_tool_call(&self, ctx: &RequestContext, tool_name: &str, params: &Value) -> GuardrailResult {
        if !self.enabled {
            return disabled();
        }

        let result = fail_closed(|| self.tool_pipeline(ctx, tool_name, params));
        self.record_decision(ctx, EVENT_CHECK_TOOL, &result);
        result
    }

    /// Check model output before it reaches the user
    pub fn check_output(&self, ctx: &RequestContext, text: &str) -> GuardrailResult {
        if !self.enabled {
            return disabled();
        }

        let result = fail_closed(|| self.output_pipeline(text));
        self.record_decision(ctx, EVENT_CHECK_OUTPUT, &result);
        result
    }

    /// Feed the observed outcome of a tool call to its circuit breaker
    pub fn record_tool_result(&self, tool_name: &str, success: bool) {
        if !self.enabled {
            return;
        }

        if success {
            self.circuit_breakers.record_success(tool_name);
        } else {
            self.circuit_breakers.record_failure(tool_name);
        }
    }

    /// Drop the tool call counters of a finished request; idempotent
    pub fn clear_request(&self, request_id: &str) {
        self.tool_policy.clear_request(request_id);
    }

    /// Price an LLM call and add it to the running totals
    ///
    /// Returns `None` when cost tracking is disabled. Emits a
    /// [`EVENT_COST_ALERT`] warning on the call that takes the request
    /// total past the alert threshold.
    pub fn record_llm_usage(
        &self,
        ctx: &RequestContext,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Option<CostTotals> {
        if !self.cost_tracker.is_enabled() {
            return None;
        }

        let before = self.cost_tracker.request_total(&ctx.request_id);
        let usage = self.cost_tracker.estimate(model, input_tokens, output_tokens);
        let totals = self
            .cost_tracker
            .record(&ctx.request_id, ctx.session_id.as_deref(), &usage);

        self.emit(TelemetryEvent::cost_recorded(
            ctx,
            model,
            input_tokens,
            output_tokens,
            usage.estimated_usd,
            totals.request_total_usd,
            totals.session_total_usd,
        ));

        if let Some(threshold) = self.cost_tracker.alert_threshold() {
            if before <= threshold && totals.request_total_usd > threshold {
                let alert = GuardrailResult::warn(
                    "cost_threshold_exceeded",
                    format!(
                        "Request cost {:.6} USD exceeds alert threshold {:.6} USD",
                        totals.request_total_usd, threshold
                    ),
                )
                .with_detail("request_total_usd", totals.request_total_usd)
                .with_detail("threshold_usd", threshold);
                self.record_decision(ctx, EVENT_COST_ALERT, &alert);
            }
        }

        Some(totals)
    }

    /// Retire a request: drop its call counters and return its cost total
    pub fn complete_request(&self, ctx: &RequestContext) -> f64 {
        self.clear_request(&ctx.request_id);
        self.cost_tracker.finalize_request(&ctx.request_id)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            rate_buckets: self.rate_limiter.snapshot(),
            breakers: self.circuit_breakers.snapshot(),
            pending_requests: self.tool_policy.pending_requests(),
        }
    }

    fn input_pipeline(&self, ctx: &RequestContext, text: &str) -> Result<GuardrailResult> {
        ensure_allowed!(self.rate_limiter.check(ctx.user_id_hash.as_deref()));
        ensure_allowed!(self.input_validator.validate(text));
        ensure_allowed!(self.input_validator.check_injection(text));

        let errors = self.schema_validator.validate_input(text)?;
        ensure_allowed!(schema_result("input_schema", "Input failed schema validation", errors));

        ensure_allowed!(self.content_filter.check(text));

        Ok(GuardrailResult::allow("input_allowed", "Input passed all guardrails"))
    }

    fn tool_pipeline(&self, ctx: &RequestContext, tool_name: &str, params: &Value) -> Result<GuardrailResult> {
        ensure_allowed!(self.tool_policy.check_allowed(tool_name));
        ensure_allowed!(self.tool_policy.check_call_limit(&ctx.request_id, tool_name));
        ensure_allowed!(self.tool_policy.check_params(tool_name, params));

        let errors = self.schema_validator.validate_tool_params(tool_name, params)?;
        ensure_allowed!(schema_result(
            "tool_params_schema",
            "Tool parameters failed schema validation",
            errors
        ));

        ensure_allowed!(self.circuit_breakers.check(tool_name));
        ensure_allowed!(self.tool_policy.check_confirmation_required(tool_name));

        Ok(GuardrailResult::allow("tool_call_allowed", "Tool call passed all guardrails"))
    }

    fn output_pipeline(&self, text: &str) -> Result<GuardrailResult> {
        ensure_allowed!(self.output_validator.validate(text));

        let errors = self.schema_validator.validate_output(text)?;
        ensure_allowed!(schema_result("output_schema", "Output failed schema validation", errors));

        ensure_allowed!(self.content_filter.check(text));

        Ok(GuardrailResult::allow("output_allowed", "Output passed all guardrails"))
    }

    fn record_decision(&self, ctx: &RequestContext, event_name: &str, result: &GuardrailResult) {
        match result.action {
            GuardrailAction::Allow => return,
            GuardrailAction::Block => tracing::warn!(
                event = event_name,
                rule = %result.rule_name,
                request_id = %ctx.request_id,
                "Guardrail blocked request: {}",
                result.reason
            ),
            _ => tracing::info!(
                event = event_name,
                action = %result.action,
                rule = %result.rule_name,
                request_id = %ctx.request_id,
                "{}",
                result.reason
            ),
        }

        let mut event = TelemetryEvent::decision(
            ctx,
            event_name,
            result.action.as_str(),
            result.rule_name.as_str(),
            result.reason.as_str(),
        );
        if !result.details.is_empty() {
            let details = Value::Object(result.details.clone());
            event = event.with_details(redact_fields(&details, &self.redacted_fields));
        }

        self.emit(event);
    }

    fn emit(&self, event: TelemetryEvent) {
        if let Err(e) = self.sink.emit(event) {
            tracing::warn!(sink = self.sink.name(), "Failed to emit telemetry event: {}", e);
        }
    }
}

fn disabled() -> GuardrailResult {
    GuardrailResult::allow("guardrails_disabled", "Guardrails disabled")
}

fn schema_result(rule_name: &str, reason: &str, errors: Vec<String>) -> GuardrailResult {
    if errors.is_empty() {
        return GuardrailResult::allow("schema_valid", "Schema validation passed");
    }
    GuardrailResult::block(rule_name, reason).with_detail("errors", errors)
}

/// Run a pipeline, turning errors and panics into a `guardrail_error` block
fn fail_closed<F>(pipeline: F) -> GuardrailResult
where
    F: FnOnce() -> Result<GuardrailResult>,
{
    let error = match panic::catch_unwind(AssertUnwindSafe(pipeline)) {
        Ok(Ok(result)) => return result,
        Ok(Err(e)) => e.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };

    tracing::error!(error = %error, "Guardrail check failed, blocking request");
    GuardrailResult::block("guardrail_error", "Guardrail evaluation failed").with_detail("error", error)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic in guardrail check".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolPolicy;
    use crate::GuardrailError;
    use governance_telemetry::MemorySink;
    use serde_json::json;

    struct FailingValidator;

    impl PayloadValidator for FailingValidator {
        fn validate_input(&self, _text: &str) -> Result<Vec<String>> {
            Err(GuardrailError::internal("schema store unavailable"))
        }

        fn validate_output(&self, _text: &str) -> Result<Vec<String>> {
            panic!("validator crashed")
        }

        fn validate_tool_params(&self, _tool_name: &str, _payload: &Value) -> Result<Vec<String>> {
            Err(GuardrailError::internal("schema store unavailable"))
        }
    }

    fn config() -> GuardrailsConfig {
        let mut config = GuardrailsConfig::default();
        config.content_safety.block_categories = vec!["harassment".to_string()];
        config.tools.policies = vec![
            ToolPolicy::new("search").with_max_calls(2),
            ToolPolicy::new("email_user").with_confirmation(),
        ];
        config
    }

    fn engine_with_memory() -> (GuardrailsEngine, Arc<MemorySink>) {
        let memory = Arc::new(MemorySink::new());
        let engine = GuardrailsEngine::new(&config()).unwrap().with_sink(memory.clone());
        (engine, memory)
    }

    #[test]
    fn test_input_allowed() {
        let (engine, memory) = engine_with_memory();
        let ctx = RequestContext::new(Some("alice"), None);

        let result = engine.check_input(&ctx, "What is the refund policy?");
        assert!(result.is_allowed());
        assert_eq!(result.rule_name, "input_allowed");
        assert!(memory.is_empty());
    }

    #[test]
    fn test_input_order_length_before_content() {
        let mut config = config();
        config.input_validation.max_input_length = 5;
        let engine = GuardrailsEngine::new(&config).unwrap();

        let result = engine.check_input(&RequestContext::anonymous(), "you are stupid");
        assert_eq!(result.rule_name, "max_input_length");
    }

    #[test]
    fn test_block_emits_event() {
        let (engine, memory) = engine_with_memory();
        let ctx = RequestContext::anonymous();

        let result = engine.check_output(&ctx, "you are stupid");
        assert_eq!(result.rule_name, "content_harassment");

        let events = memory.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), EVENT_CHECK_OUTPUT);
        assert_eq!(events[0].request_id(), ctx.request_id);
    }

    #[test]
    fn test_confirm_is_surfaced_and_reported() {
        let (engine, memory) = engine_with_memory();

        let result = engine.check_tool_call(&RequestContext::anonymous(), "email_user", &json!({}));
        assert!(result.needs_confirmation());
        assert_eq!(result.rule_name, "confirmation_required");
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_error_fails_closed() {
        let (engine, memory) = engine_with_memory();
        let engine = engine.with_schema_validator(Arc::new(FailingValidator));

        let result = engine.check_input(&RequestContext::anonymous(), "hello");
        assert!(result.should_block());
        assert_eq!(result.rule_name, "guardrail_error");
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_panic_fails_closed() {
        let engine = GuardrailsEngine::new(&config())
            .unwrap()
            .with_schema_validator(Arc::new(FailingValidator));

        let result = engine.check_output(&RequestContext::anonymous(), "hello");
        assert_eq!(result.rule_name, "guardrail_error");
        assert_eq!(result.details["error"], "panic: validator crashed");
    }

    #[test]
    fn test_structured_output_schema() {
        let schemas = ModelSchemaValidator::from_document(&json!({
            "output_schema": {
                "type": "object",
                "properties": {"valid": {"type": "boolean"}},
                "required": ["valid"],
            },
        }))
        .unwrap();
        let engine = GuardrailsEngine::new(&config())
            .unwrap()
            .with_schema_validator(Arc::new(schemas));
        let ctx = RequestContext::anonymous();

        let result = engine.check_output(&ctx, r#"{"valid": true}"#);
        assert_eq!(result.rule_name, "output_allowed");

        let result = engine.check_output(&ctx, r#"{"answer": 42}"#);
        assert_eq!(result.rule_name, "output_schema");
        assert_eq!(result.details["errors"].as_array().unwrap().len(), 1);

        let result = engine.check_output(&ctx, "Sure, here you go");
        assert_eq!(result.rule_name, "output_schema");
        assert!(result.details["errors"][0].as_str().unwrap().starts_with("invalid JSON"));

        // No input schema, so free text still passes.
        assert!(engine.check_input(&ctx, "Sure, here you go").is_allowed());
    }

    #[test]
    fn test_sink_failure_does_not_change_verdict() {
        let sink = Arc::new(governance_telemetry::CallbackSink::new(|_event| {
            Err(governance_telemetry::TelemetryError::sink("collector down"))
        }));
        let engine = GuardrailsEngine::new(&config()).unwrap().with_sink(sink);

        let result = engine.check_output(&RequestContext::anonymous(), "you are stupid");
        assert_eq!(result.rule_name, "content_harassment");
    }

    #[test]
    fn test_details_are_redacted() {
        let (engine, memory) = engine_with_memory();
        let engine = engine.with_redacted_fields(["keyword"]);

        engine.check_output(&RequestContext::anonymous(), "you are stupid");

        match &memory.events()[0] {
            TelemetryEvent::GuardrailDecision { details, .. } => {
                assert_eq!(details["keyword"], governance_telemetry::REDACTED);
                assert_eq!(details["category"], "harassment");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_disabled_engine_has_no_side_effects() {
        let mut config = config();
        config.enabled = false;
        config.rate_limiting.requests_per_minute_per_user = 1;
        let memory = Arc::new(MemorySink::new());
        let engine = GuardrailsEngine::new(&config).unwrap().with_sink(memory.clone());
        let ctx = RequestContext::new(Some("alice"), None);

        let before = engine.snapshot();
        for _ in 0..5 {
            assert!(engine.check_input(&ctx, "you are stupid").is_allowed());
            assert!(engine.check_tool_call(&ctx, "search", &json!({})).is_allowed());
            assert!(engine.check_output(&ctx, "you are stupid").is_allowed());
            engine.record_tool_result("search", false);
        }

        assert_eq!(engine.snapshot(), before);
        assert!(memory.is_empty());
    }

    #[test]
    fn test_complete_request() {
        let mut config = config();
        config.cost.enabled = true;
        config.cost.pricing.insert(
            "model-a".to_string(),
            crate::config::ModelPricing { input: 1.0, output: 2.0 },
        );
        let engine = GuardrailsEngine::new(&config).unwrap();
        let ctx = RequestContext::anonymous();

        engine.check_tool_call(&ctx, "search", &json!({}));
        engine.record_llm_usage(&ctx, "model-a", 1_000_000, 0);
        assert_eq!(engine.snapshot().pending_requests, 1);

        assert_eq!(engine.complete_request(&ctx), 1.0);
        assert_eq!(engine.snapshot().pending_requests, 0);
        assert_eq!(engine.complete_request(&ctx), 0.0);
    }

    #[test]
    fn test_cost_disabled() {
        let engine = GuardrailsEngine::new(&config()).unwrap();
        assert!(engine
            .record_llm_usage(&RequestContext::anonymous(), "model-a", 10, 10)
            .is_none());
    }

    #[test]
    fn test_construction_errors() {
        let mut config = config();
        config.content_safety.blocked_patterns = vec!["(".to_string()];
        assert!(GuardrailsEngine::new(&config).is_err());

        let mut config = GuardrailsConfig::default();
        config.model_schema_file = Some("/nonexistent/schemas.yaml".into());
        assert!(GuardrailsEngine::new(&config).is_err());
    }
}
