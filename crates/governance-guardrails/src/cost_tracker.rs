//! LLM cost accounting based on token usage

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;

use crate::config::{CostConfig, ModelPricing};

const TOKENS_PER_PRICE_UNIT: f64 = 1_000_000.0;

/// Priced usage of one LLM call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostUsage {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_usd: f64,
}

/// Running totals after recording a call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostTotals {
    pub request_total_usd: f64,
    pub session_total_usd: f64,
}

/// Cost tracker
///
/// Accumulates estimated spend per request and per session. Request totals
/// are read and cleared once the request completes; session totals last
/// for the lifetime of the tracker.
pub struct CostTracker {
    enabled: bool,
    pricing: HashMap<String, ModelPricing>,
    alert_threshold_usd: f64,
    request_totals: DashMap<String, f64>,
    session_totals: DashMap<String, f64>,
}

impl CostTracker {
    pub fn new(config: &CostConfig) -> Self {
        Self {
            enabled: config.enabled,
            pricing: config.pricing.clone(),
            alert_threshold_usd: config.alert_threshold_usd,
            request_totals: DashMap::new(),
            session_totals: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Request total above which a warning is raised, if any
    pub fn alert_threshold(&self) -> Option<f64> {
        (self.alert_threshold_usd > 0.0).then_some(self.alert_threshold_usd)
    }

    /// Price a call; models without pricing cost nothing
    pub fn estimate(&self, model: &str, input_tokens: u64, output_tokens: u64) -> CostUsage {
        let pricing = self.pricing.get(model).copied().unwrap_or_default();
        let usd = input_tokens as f64 / TOKENS_PER_PRICE_UNIT * pricing.input
            + output_tokens as f64 / TOKENS_PER_PRICE_UNIT * pricing.output;

        CostUsage {
            model: model.to_string(),
            input_tokens,
            output_tokens,
            estimated_usd: round_usd(usd),
        }
    }

    /// Add a priced call to the request and session totals
    pub fn record(&self, request_id: &str, session_id: Option<&str>, usage: &CostUsage) -> CostTotals {
        let request_total_usd = {
            let mut total = self.request_totals.entry(request_id.to_string()).or_insert(0.0);
            *total = round_usd(*total + usage.estimated_usd);
            *total
        };

        let session_total_usd = match session_id {
            Some(session_id) => {
                let mut total = self.session_totals.entry(session_id.to_string()).or_insert(0.0);
                *total = round_usd(*total + usage.estimated_usd);
                *total
            }
            None => 0.0,
        };

        tracing::debug!(
            model = %usage.model,
            usd = usage.estimated_usd,
            request_total_usd,
            "Recorded LLM cost"
        );

        CostTotals {
            request_total_usd,
            session_total_usd,
        }
    }

    /// Read and clear a request's total
    pub fn finalize_request(&self, request_id: &str) -> f64 {
        self.request_totals
            .remove(request_id)
            .map(|(_, total)| total)
            .unwrap_or(0.0)
    }

    pub fn request_total(&self, request_id: &str) -> f64 {
        self.request_totals.get(request_id).map(|v| *v).unwrap_or(0.0)
    }

    pub fn session_total(&self, session_id: &str) -> f64 {
        self.session_totals.get(session_id).map(|v| *v).unwrap_or(0.0)
    }

    /// Number of requests with an open total
    pub fn open_requests(&self) -> usize {
        self.request_totals.len()
    }
}

fn round_usd(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}
