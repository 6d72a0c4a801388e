//! GCRA (Generic Cell Rate Algorithm).
//!
//! Tracks a single theoretical arrival time (TAT) per key instead of a
//! counter. `emission_interval = period / limit` is the steady-state spacing
//! between admitted units; `burst` controls how far ahead of `now` the TAT
//! may sit while still admitting a request.
//!
//! Inspired by <https://brandur.org/rate-limiting>, as the original
//! implementation credits.
//!
//! The remote scripts source `now` from `redis.call("TIME")` rather than a
//! client-supplied argument, so admission decisions are judged against one
//! clock regardless of which application host issued the request. A fixed
//! `jan_1_2025` offset keeps the epoch-seconds-plus-microseconds value well
//! inside `f64`'s exact-integer range. The memory backend has no such
//! client/server split and keeps using the process's own wall clock.

use std::time::Duration;

use crate::decision::{Decision, RateLimitState};
use crate::error::Result;
use crate::keys::prepare_key;
use crate::quota::Quota;
use crate::storage::{now_f64, Store};

const ALGORITHM_ID: &str = "gcra";

#[cfg(feature = "redis")]
static LIMIT_SCRIPT: std::sync::LazyLock<deadpool_redis::redis::Script> =
    std::sync::LazyLock::new(|| {
        deadpool_redis::redis::Script::new(
            r#"
            local emission_interval = tonumber(ARGV[1])
            local capacity = tonumber(ARGV[2])
            local cost = tonumber(ARGV[3])

            local jan_1_2025 = 1735660800
            local now_parts = redis.call("TIME")
            local now = (now_parts[1] - jan_1_2025) + (now_parts[2] / 1000000)

            local last_tat = redis.call("GET", KEYS[1])
            if not last_tat then
                last_tat = now
            else
                last_tat = tonumber(last_tat)
            end

            local fill_time_for_cost = cost * emission_interval
            local fill_time_for_capacity = capacity * emission_interval
            local tat = math.max(now, last_tat) + fill_time_for_cost
            local allow_at = tat - fill_time_for_capacity
            local time_elapsed = now - allow_at

            local limited = 0
            local retry_after = 0
            local reset_after = tat - now
            local remaining = math.floor(time_elapsed / emission_interval)
            if remaining < 0 then
                limited = 1
                retry_after = time_elapsed * -1
                reset_after = math.max(0, last_tat - now)
                remaining = math.min(capacity, cost + remaining)
            else
                redis.call("SET", KEYS[1], tat, "EX", math.ceil(reset_after))
            end

            return {tostring(limited), tostring(remaining), tostring(reset_after), tostring(retry_after)}
            "#,
        )
    });

#[cfg(feature = "redis")]
static PEEK_SCRIPT: std::sync::LazyLock<deadpool_redis::redis::Script> =
    std::sync::LazyLock::new(|| {
        deadpool_redis::redis::Script::new(
            r#"
            local emission_interval = tonumber(ARGV[1])
            local capacity = tonumber(ARGV[2])

            local jan_1_2025 = 1735660800
            local now_parts = redis.call("TIME")
            local now = (now_parts[1] - jan_1_2025) + (now_parts[2] / 1000000)

            local tat = redis.call("GET", KEYS[1])
            if not tat then
                tat = now
            else
                tat = tonumber(tat)
            end

            local fill_time_for_capacity = capacity * emission_interval
            local allow_at = math.max(tat, now) - fill_time_for_capacity
            local time_elapsed = now - allow_at

            local limited = 0
            local retry_after = 0
            local reset_after = math.max(0, tat - now)
            local remaining = math.floor(time_elapsed / emission_interval)
            if remaining < 1 then
                limited = 1
                remaining = 0
                retry_after = time_elapsed * -1
            end

            return {tostring(limited), tostring(remaining), tostring(reset_after), tostring(retry_after)}
            "#,
        )
    });

struct GcraResult {
    limited: bool,
    remaining: u64,
    reset_after: f64,
    retry_after: f64,
}

fn limit_memory(last_tat: f64, now: f64, emission_interval: f64, capacity: f64, cost: f64) -> (GcraResult, f64) {
    let fill_time_for_cost = cost * emission_interval;
    let fill_time_for_capacity = capacity * emission_interval;
    let tat = now.max(last_tat) + fill_time_for_cost;
    let allow_at = tat - fill_time_for_capacity;
    let time_elapsed = now - allow_at;

    let mut remaining = (time_elapsed / emission_interval).floor();
    let (limited, retry_after, reset_after, new_tat) = if remaining < 0.0 {
        remaining = capacity.min(cost + remaining);
        (true, -time_elapsed, (last_tat - now).max(0.0), last_tat)
    } else {
        (false, 0.0, tat - now, tat)
    };

    (
        GcraResult {
            limited,
            remaining: remaining as u64,
            reset_after,
            retry_after,
        },
        new_tat,
    )
}

fn peek_memory(tat: f64, now: f64, emission_interval: f64, capacity: f64) -> GcraResult {
    let fill_time_for_capacity = capacity * emission_interval;
    let allow_at = tat.max(now) - fill_time_for_capacity;
    let time_elapsed = now - allow_at;
    let reset_after = (tat - now).max(0.0);
    let mut remaining = (time_elapsed / emission_interval).floor();

    let (limited, retry_after) = if remaining < 1.0 {
        remaining = 0.0;
        (true, -time_elapsed)
    } else {
        (false, 0.0)
    };

    GcraResult {
        limited,
        remaining: remaining as u64,
        reset_after,
        retry_after,
    }
}

/// GCRA (generic cell rate algorithm) rate limiter.
#[derive(Debug, Default, Clone, Copy)]
pub struct GCRA;

impl GCRA {
    /// Construct a GCRA limiter.
    pub fn new() -> Self {
        Self
    }

    /// Check whether the request is allowed and record it atomically.
    pub async fn limit(&self, store: &Store, key: &str, quota: &Quota, cost: u64) -> Result<Decision> {
        let emission_interval = quota.emission_interval().as_secs_f64();
        let capacity = quota.burst() as f64;
        let now = now_f64();
        let formatted_key = prepare_key(ALGORITHM_ID, key);

        let result = match store {
            Store::Memory(m) => {
                let mut cache = m.lock().await;
                let last_tat = match cache.get_mut(&formatted_key) {
                    Some(entry) => match entry.value {
                        crate::storage::memory::Value::Scalar(v) => v,
                        crate::storage::memory::Value::Hash(_) => now,
                    },
                    None => now,
                };
                let (result, new_tat) = limit_memory(last_tat, now, emission_interval, capacity, cost as f64);
                if !result.limited {
                    cache.put(
                        formatted_key.clone(),
                        crate::storage::memory::Entry {
                            value: crate::storage::memory::Value::Scalar(new_tat),
                            expires_at: Some(crate::storage::now_sec() + result.reset_after.ceil().max(1.0) as u64),
                        },
                    );
                }
                result
            }
            #[cfg(feature = "redis")]
            Store::Remote(r) => {
                let raw = r
                    .eval_script(&LIMIT_SCRIPT, &[&formatted_key], &[emission_interval, capacity, cost as f64])
                    .await?;
                GcraResult {
                    limited: *raw.first().unwrap_or(&0.0) != 0.0,
                    remaining: *raw.get(1).unwrap_or(&0.0) as u64,
                    reset_after: *raw.get(2).unwrap_or(&0.0),
                    retry_after: *raw.get(3).unwrap_or(&0.0),
                }
            }
        };

        Ok(Decision {
            limited: result.limited,
            limit: capacity as u64,
            remaining: result.remaining,
            reset_after: Duration::from_secs_f64(result.reset_after.max(0.0)),
            retry_after: Duration::from_secs_f64(result.retry_after.max(0.0)),
        })
    }

    /// Observe current state without mutating it.
    pub async fn peek(&self, store: &Store, key: &str, quota: &Quota) -> Result<RateLimitState> {
        let emission_interval = quota.emission_interval().as_secs_f64();
        let capacity = quota.burst() as f64;
        let now = now_f64();
        let formatted_key = prepare_key(ALGORITHM_ID, key);

        let result = match store {
            Store::Memory(m) => {
                let cache = m.lock().await;
                let tat = match cache.peek(&formatted_key) {
                    Some(entry) => match entry.value {
                        crate::storage::memory::Value::Scalar(v) => v,
                        crate::storage::memory::Value::Hash(_) => now,
                    },
                    None => now,
                };
                drop(cache);
                peek_memory(tat, now, emission_interval, capacity)
            }
            #[cfg(feature = "redis")]
            Store::Remote(r) => {
                let raw = r
                    .eval_script(&PEEK_SCRIPT, &[&formatted_key], &[emission_interval, capacity])
                    .await?;
                GcraResult {
                    limited: *raw.first().unwrap_or(&0.0) != 0.0,
                    remaining: *raw.get(1).unwrap_or(&0.0) as u64,
                    reset_after: *raw.get(2).unwrap_or(&0.0),
                    retry_after: *raw.get(3).unwrap_or(&0.0),
                }
            }
        };

        Ok(RateLimitState {
            limit: capacity as u64,
            remaining: result.remaining,
            reset_after: Duration::from_secs_f64(result.reset_after.max(0.0)),
        })
    }
}
