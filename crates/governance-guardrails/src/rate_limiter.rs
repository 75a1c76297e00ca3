//! Sliding-window rate limiting

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitingConfig;
use crate::GuardrailResult;

/// Bucket key shared by every caller
pub const GLOBAL_KEY: &str = "global";

type Bucket = Arc<Mutex<VecDeque<Instant>>>;

/// Rate limiter guardrail
///
/// Keeps one window of admitted-call timestamps per key: `user:<hash>` for
/// each caller and [`GLOBAL_KEY`] for everyone. Each bucket has its own
/// lock, so callers with different keys only contend on the global bucket.
/// User buckets whose calls have all left the window are dropped by a
/// sweep that runs at most once per window.
pub struct RateLimiter {
    enabled: bool,
    user_limit: usize,
    global_limit: usize,
    window: Duration,
    buckets: DashMap<String, Bucket>,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `user_limit` - Calls admitted per user within the window
    /// * `global_limit` - Calls admitted overall within the window
    /// * `window` - Length of the sliding window
    pub fn new(user_limit: usize, global_limit: usize, window: Duration) -> Self {
        Self {
            enabled: true,
            user_limit,
            global_limit,
            window,
            buckets: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn from_config(config: &RateLimitingConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(
                config.requests_per_minute_per_user,
                config.requests_per_minute_global,
                config.window(),
            )
        }
    }

    /// A limiter that admits everything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(0, 0, Duration::ZERO)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // Shard guards are released before any bucket lock is taken.
    fn bucket(&self, key: &str) -> Bucket {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }
        Arc::clone(self.buckets.entry(key.to_string()).or_default().value())
    }

    fn prune(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = calls.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// Check and, when admitted, register one call
    ///
    /// The user bucket is checked first; a user rejection leaves the
    /// global bucket untouched. Both buckets record the call only when
    /// both admit it. `user_key` is the caller's user hash; `None` or an
    /// empty key skips the per-user limit.
    pub fn check(&self, user_key: Option<&str>) -> GuardrailResult {
        if !self.enabled {
            return GuardrailResult::allow("rate_limit_disabled", "Rate limiting disabled");
        }

        let now = Instant::now();
        self.sweep_idle(now);

        // Lock order is always user then global.
        let user_bucket = user_key
            .filter(|key| !key.is_empty())
            .map(|key| self.bucket(&format!("user:{}", key)));
        let mut user_calls = None;

        if let Some(bucket) = &user_bucket {
            let mut calls = bucket.lock();
            self.prune(&mut calls, now);
            if calls.len() >= self.user_limit {
                return GuardrailResult::block("rate_limit_user", "User rate limit exceeded")
                    .with_detail("limit", self.user_limit)
                    .with_detail("window_seconds", self.window.as_secs());
            }
            user_calls = Some(calls);
        }

        let global_bucket = self.bucket(GLOBAL_KEY);
        let mut global_calls = global_bucket.lock();
        self.prune(&mut global_calls, now);
        if global_calls.len() >= self.global_limit {
            return GuardrailResult::block("rate_limit_global", "Global rate limit exceeded")
                .with_detail("limit", self.global_limit)
                .with_detail("window_seconds", self.window.as_secs());
        }

        global_calls.push_back(now);
        if let Some(mut calls) = user_calls {
            calls.push_back(now);
        }

        GuardrailResult::allow("rate_limit_ok", "Within rate limits")
    }

    /// Drop user buckets with no calls left in the window
    ///
    /// Never waits on a bucket lock: a bucket that is locked or still
    /// referenced by an in-flight check is kept for the next sweep.
    fn sweep_idle(&self, now: Instant) {
        {
            let Some(mut last_sweep) = self.last_sweep.try_lock() else {
                return;
            };
            if now.saturating_duration_since(*last_sweep) < self.window {
                return;
            }
            *last_sweep = now;
        }

        // Under the shard write lock no new handle can be cloned, so a
        // strong count of one means nobody else holds the bucket.
        self.buckets.retain(|key, bucket| {
            if key == GLOBAL_KEY || Arc::strong_count(bucket) > 1 {
                return true;
            }
            match bucket.try_lock() {
                Some(mut calls) => {
                    self.prune(&mut calls, now);
                    !calls.is_empty()
                }
                None => true,
            }
        });
    }

    /// Number of calls currently recorded for a key
    pub fn recorded(&self, key: &str) -> usize {
        let bucket = self.buckets.get(key).map(|bucket| Arc::clone(bucket.value()));
        bucket.map(|bucket| bucket.lock().len()).unwrap_or(0)
    }

    /// Recorded call count per bucket key
    pub fn snapshot(&self) -> BTreeMap<String, usize> {
        let buckets: Vec<(String, Bucket)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        buckets
            .into_iter()
            .map(|(key, bucket)| (key, bucket.lock().len()))
            .collect()
    }
}
