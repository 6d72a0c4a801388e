//! Sliding window algorithm.
//!
//! Weights the previous period's count by how far `now` sits into the current
//! period, giving a smoother approximation of a true sliding window than
//! [`crate::algorithm::FixedWindow`] at roughly the same storage cost: two
//! counters instead of one.

use std::time::Duration;

use crate::decision::{Decision, RateLimitState};
use crate::error::Result;
use crate::keys::prepare_key;
use crate::quota::Quota;
use crate::storage::memory::Value;
use crate::storage::{now_ms, now_sec, Store};

const ALGORITHM_ID: &str = "sliding_window";

#[cfg(feature = "redis")]
static LIMIT_SCRIPT: std::sync::LazyLock<deadpool_redis::redis::Script> =
    std::sync::LazyLock::new(|| {
        deadpool_redis::redis::Script::new(
            r#"
            local period = tonumber(ARGV[1])
            local limit = tonumber(ARGV[2])
            local cost = tonumber(ARGV[3])
            local now_ms = tonumber(ARGV[4])

            local current = redis.call("INCRBY", KEYS[1], cost)
            if current == cost then
                redis.call("EXPIRE", KEYS[1], 3 * period)
            end

            local previous = tonumber(redis.call("GET", KEYS[2]))
            if previous == nil then
                previous = 0
            end

            local period_ms = period * 1000
            local proportion = (now_ms % period_ms) / period_ms
            local weighted_previous = math.floor((1 - proportion) * previous)
            local used = weighted_previous + current

            return {tostring(used > limit and 1 or 0), tostring(used)}
            "#,
        )
    });

/// Sliding window rate limiter.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlidingWindow;

impl SlidingWindow {
    /// Construct a sliding window limiter.
    pub fn new() -> Self {
        Self
    }

    fn keys(&self, key: &str, period_secs: u64, now: u64) -> (String, String) {
        let base = prepare_key(ALGORITHM_ID, key);
        let idx = (now / period_secs) as i64;
        (
            format!("{base}:period:{idx}"),
            format!("{base}:period:{}", idx - 1),
        )
    }

    /// Check whether the request is allowed and record it atomically.
    pub async fn limit(&self, store: &Store, key: &str, quota: &Quota, cost: u64) -> Result<Decision> {
        let period_secs = quota.period().as_secs().max(1);
        let limit = quota.limit();
        let now = now_sec();
        let (current_key, previous_key) = self.keys(key, period_secs, now);
        let now_ms = now_ms();

        let used = match store {
            Store::Memory(m) => {
                let mut cache = m.lock().await;
                let current = match cache.get_mut(&current_key) {
                    Some(entry) => {
                        if let Value::Scalar(v) = &mut entry.value {
                            *v += cost as f64;
                            *v as u64
                        } else {
                            cost
                        }
                    }
                    None => {
                        cache.put(
                            current_key.clone(),
                            crate::storage::memory::Entry {
                                value: Value::Scalar(cost as f64),
                                expires_at: Some(now_sec() + 3 * period_secs),
                            },
                        );
                        cost
                    }
                };
                let previous_raw = match cache.peek(&previous_key) {
                    Some(entry) => match entry.value {
                        Value::Scalar(v) => v,
                        Value::Hash(_) => 0.0,
                    },
                    None => 0.0,
                };
                let period_ms = period_secs * 1000;
                let proportion = (now_ms % period_ms) as f64 / period_ms as f64;
                let weighted_previous = ((1.0 - proportion) * previous_raw).floor() as u64;
                weighted_previous + current
            }
            #[cfg(feature = "redis")]
            Store::Remote(r) => {
                let results = r
                    .eval_script(
                        &LIMIT_SCRIPT,
                        &[&current_key, &previous_key],
                        &[period_secs as f64, limit as f64, cost as f64, now_ms as f64],
                    )
                    .await?;
                *results.get(1).unwrap_or(&0.0) as u64
            }
        };

        let reset_after = Duration::from_secs(period_secs - (now % period_secs));
        let limited = used > limit;
        let remaining = limit.saturating_sub(used);
        let retry_after = if limited { reset_after } else { Duration::ZERO };

        Ok(Decision {
            limited,
            limit,
            remaining,
            reset_after,
            retry_after,
        })
    }

    /// Observe current state without mutating it.
    pub async fn peek(&self, store: &Store, key: &str, quota: &Quota) -> Result<RateLimitState> {
        let period_secs = quota.period().as_secs().max(1);
        let limit = quota.limit();
        let now = now_sec();
        let (current_key, previous_key) = self.keys(key, period_secs, now);
        let now_ms = now_ms();

        let current = store.get(&current_key).await?.unwrap_or(0.0);
        let previous_raw = store.get(&previous_key).await?.unwrap_or(0.0);
        let period_ms = period_secs * 1000;
        let proportion = (now_ms % period_ms) as f64 / period_ms as f64;
        let weighted_previous = ((1.0 - proportion) * previous_raw).floor();
        let used = (weighted_previous + current) as u64;

        Ok(RateLimitState {
            limit,
            remaining: limit.saturating_sub(used),
            reset_after: Duration::from_secs(period_secs - (now % period_secs)),
        })
    }
}
