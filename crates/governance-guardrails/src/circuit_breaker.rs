//! Per-tool circuit breakers

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use crate::config::{CircuitBreakerConfig, ToolPolicy};
use crate::GuardrailResult;

/// Failure counter that opens after too many consecutive failures
///
/// Closed while `opened_at` is unset. Recovery is purely time based:
/// once `reset_after` has passed since opening, the next `is_open` call
/// closes the breaker and clears the failure count.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    max_failures: u32,
    reset_after: Duration,
    failure_count: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, reset_after: Duration) -> Self {
        Self {
            max_failures,
            reset_after,
            failure_count: 0,
            opened_at: None,
        }
    }

    /// Count a failure, opening the breaker at the threshold
    ///
    /// Returns true if this call opened a closed breaker.
    pub fn record_failure(&mut self) -> bool {
        self.failure_count = self.failure_count.saturating_add(1);
        if self.failure_count >= self.max_failures {
            let was_closed = self.opened_at.is_none();
            self.opened_at = Some(Instant::now());
            return was_closed;
        }
        false
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.opened_at = None;
    }

    /// Whether calls are currently refused, closing the breaker first
    /// if its reset period has passed
    pub fn is_open(&mut self) -> bool {
        match self.opened_at {
            None => false,
            Some(opened_at) if opened_at.elapsed() > self.reset_after => {
                self.record_success();
                false
            }
            Some(_) => true,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// State without applying the time-based reset
    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            failure_count: self.failure_count,
            open: self.opened_at.is_some(),
        }
    }
}

/// Observed state of one breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub failure_count: u32,
    pub open: bool,
}

/// Breakers for every tool with an explicit policy
///
/// The set of breakers is fixed at construction; each one sits behind
/// its own lock. Tools without a breaker are never reported open.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: HashMap<String, Mutex<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One breaker per policy, using the policy's threshold when set
    pub fn from_policies(policies: &[ToolPolicy], defaults: &CircuitBreakerConfig) -> Self {
        policies.iter().fold(Self::new(), |registry, policy| {
            registry.with_breaker(
                policy.tool_name.clone(),
                policy.circuit_breaker_threshold.unwrap_or(defaults.max_failures),
                defaults.reset_after(),
            )
        })
    }

    /// Add a breaker for a tool
    pub fn with_breaker(mut self, tool_name: impl Into<String>, max_failures: u32, reset_after: Duration) -> Self {
        self.breakers.insert(
            tool_name.into(),
            Mutex::new(CircuitBreaker::new(max_failures, reset_after)),
        );
        self
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        self.breakers.contains_key(tool_name)
    }

    pub fn is_open(&self, tool_name: &str) -> bool {
        self.breakers.get(tool_name).is_some_and(|breaker| {
            let mut breaker = breaker.lock();
            let had_opened = breaker.snapshot().open;
            let open = breaker.is_open();
            if had_opened && !open {
                tracing::debug!(tool = tool_name, "Circuit breaker closed after reset period");
            }
            open
        })
    }

    /// BLOCK while the tool's breaker is open
    pub fn check(&self, tool_name: &str) -> GuardrailResult {
        if self.is_open(tool_name) {
            GuardrailResult::block("circuit_open", format!("Circuit breaker open for tool '{}'", tool_name))
                .with_detail("tool", tool_name)
        } else {
            GuardrailResult::allow("circuit_closed", "Circuit breaker closed")
        }
    }

    pub fn record_success(&self, tool_name: &str) {
        if let Some(breaker) = self.breakers.get(tool_name) {
            breaker.lock().record_success();
        }
    }

    pub fn record_failure(&self, tool_name: &str) {
        if let Some(breaker) = self.breakers.get(tool_name) {
            let mut breaker = breaker.lock();
            if breaker.record_failure() {
                tracing::debug!(
                    tool = tool_name,
                    failures = breaker.failure_count(),
                    "Circuit breaker opened"
                );
            }
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, BreakerSnapshot> {
        self.breakers
            .iter()
            .map(|(tool, breaker)| (tool.clone(), breaker.lock().snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_opens_after_max_failures() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        assert!(!breaker.record_failure());
        assert!(!breaker.record_failure());
        assert!(!breaker.is_open());
        assert!(breaker.record_failure());
        assert!(breaker.is_open());
        assert_eq!(breaker.failure_count(), 3);
    }

    #[test]
    fn test_success_resets() {
        let mut breaker = CircuitBreaker::new(2, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(breaker.is_open());
        breaker.record_success();
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_auto_reset_after_period() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_millis(50));

        breaker.record_failure();
        assert!(breaker.is_open());

        thread::sleep(Duration::from_millis(80));

        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.snapshot(), BreakerSnapshot { failure_count: 0, open: false });
    }

    #[test]
    fn test_registry_from_policies() {
        let policies = vec![
            ToolPolicy::new("search"),
            ToolPolicy::new("deploy").with_breaker_threshold(1),
        ];
        let registry = CircuitBreakerRegistry::from_policies(&policies, &CircuitBreakerConfig::default());

        assert_eq!(registry.len(), 2);

        registry.record_failure("deploy");
        assert!(registry.is_open("deploy"));

        for _ in 0..4 {
            registry.record_failure("search");
        }
        assert!(!registry.is_open("search"));
        registry.record_failure("search");
        assert!(registry.is_open("search"));
    }

    #[test]
    fn test_registry_check() {
        let registry = CircuitBreakerRegistry::new().with_breaker("db", 1, Duration::from_secs(60));

        assert!(registry.check("db").is_allowed());
        registry.record_failure("db");

        let result = registry.check("db");
        assert!(result.should_block());
        assert_eq!(result.rule_name, "circuit_open");

        registry.record_success("db");
        assert!(registry.check("db").is_allowed());
    }

    #[test]
    fn test_unconfigured_tool_never_opens() {
        let registry = CircuitBreakerRegistry::new();

        for _ in 0..100 {
            registry.record_failure("unknown");
        }
        assert!(!registry.is_open("unknown"));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_failures_are_all_counted() {
        let registry = Arc::new(CircuitBreakerRegistry::new().with_breaker("api", 1000, Duration::from_secs(60)));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        registry.record_failure("api");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot()["api"].failure_count, 400);
    }
}
