//! Leaking bucket algorithm.
//!
//! A bucket accumulates `tokens` of outstanding load and leaks at
//! `rate = limit / period` tokens per second. A request of `cost` is admitted
//! iff `tokens + cost <= capacity`.

use std::time::Duration;

use crate::decision::{Decision, RateLimitState};
use crate::error::Result;
use crate::keys::prepare_key;
use crate::quota::Quota;
use crate::storage::{now_sec, Store};

const ALGORITHM_ID: &str = "leaking_bucket";

#[cfg(feature = "redis")]
static LIMIT_SCRIPT: std::sync::LazyLock<deadpool_redis::redis::Script> =
    std::sync::LazyLock::new(|| {
        deadpool_redis::redis::Script::new(
            r#"
            local rate = tonumber(ARGV[1])
            local capacity = tonumber(ARGV[2])
            local cost = tonumber(ARGV[3])
            local now = tonumber(ARGV[4])

            local last_tokens = 0
            local last_refreshed = now
            local bucket = redis.call("HMGET", KEYS[1], "tokens", "last_refreshed")

            if bucket[1] ~= false then
                last_tokens = tonumber(bucket[1])
                last_refreshed = tonumber(bucket[2])
            end

            local time_elapsed = math.max(0, now - last_refreshed)
            local tokens = math.max(0, last_tokens - (math.floor(time_elapsed * rate)))

            local limited = tokens + cost > capacity
            if limited then
                return {tostring(1), tostring(tokens)}
            end

            local fill_time = capacity / rate
            redis.call("EXPIRE", KEYS[1], math.floor(2 * fill_time))
            redis.call("HSET", KEYS[1], "tokens", tokens + cost, "last_refreshed", now)
            return {tostring(0), tostring(tokens + cost)}
            "#,
        )
    });

fn leak(last_tokens: f64, last_refreshed: f64, rate: f64, now: f64) -> f64 {
    let elapsed = (now - last_refreshed).max(0.0);
    (last_tokens - (elapsed * rate).floor()).max(0.0)
}


/// Leaking bucket rate limiter.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeakyBucket;

impl LeakyBucket {
    /// Construct a leaking bucket limiter.
    pub fn new() -> Self {
        Self
    }

    /// Check whether the request is allowed and record it atomically.
    pub async fn limit(&self, store: &Store, key: &str, quota: &Quota, cost: u64) -> Result<Decision> {
        let rate = quota.rate();
        let capacity = quota.burst() as f64;
        let now = now_sec() as f64;
        let formatted_key = prepare_key(ALGORITHM_ID, key);

        let (limited, tokens_after) = match store {
            Store::Memory(m) => {
                let mut cache = m.lock().await;
                let (last_tokens, last_refreshed) = match cache.get_mut(&formatted_key) {
                    Some(entry) => match &entry.value {
                        crate::storage::memory::Value::Hash(map) => (
                            *map.get("tokens").unwrap_or(&0.0),
                            *map.get("last_refreshed").unwrap_or(&now),
                        ),
                        _ => (0.0, now),
                    },
                    None => (0.0, now),
                };

                let tokens = leak(last_tokens, last_refreshed, rate, now);
                let limited = tokens + cost as f64 > capacity;
                if limited {
                    (true, tokens)
                } else {
                    let fill_time = capacity / rate;
                    let new_tokens = tokens + cost as f64;
                    let mut map = std::collections::HashMap::new();
                    map.insert("tokens".to_string(), new_tokens);
                    map.insert("last_refreshed".to_string(), now);
                    cache.put(
                        formatted_key.clone(),
                        crate::storage::memory::Entry {
                            value: crate::storage::memory::Value::Hash(map),
                            expires_at: Some(now_sec() + (2.0 * fill_time).floor().max(1.0) as u64),
                        },
                    );
                    (false, new_tokens)
                }
            }
            #[cfg(feature = "redis")]
            Store::Remote(r) => {
                let results = r
                    .eval_script(&LIMIT_SCRIPT, &[&formatted_key], &[rate, capacity, cost as f64, now])
                    .await?;
                let limited = *results.first().unwrap_or(&0.0) != 0.0;
                let tokens = *results.get(1).unwrap_or(&0.0);
                (limited, tokens)
            }
        };

        // tokens_after is the used-capacity load; reset_after is how long until
        // it fully drains, retry_after is how long until `cost` more fits.
        let reset_after = Duration::from_secs_f64((tokens_after / rate).ceil());
        let retry_after = if limited {
            Duration::from_secs_f64(((cost as f64 - (capacity - tokens_after)) / rate).max(0.0).ceil())
        } else {
            Duration::ZERO
        };

        Ok(Decision {
            limited,
            limit: capacity as u64,
            remaining: (capacity - tokens_after).max(0.0) as u64,
            reset_after,
            retry_after,
        })
    }

    /// Observe current state without mutating it.
    pub async fn peek(&self, store: &Store, key: &str, quota: &Quota) -> Result<RateLimitState> {
        let rate = quota.rate();
        let capacity = quota.burst() as f64;
        let now = now_sec() as f64;
        let formatted_key = prepare_key(ALGORITHM_ID, key);

        let bucket = store.hgetall(&formatted_key).await?;
        let last_tokens = *bucket.get("tokens").unwrap_or(&0.0);
        let last_refreshed = *bucket.get("last_refreshed").unwrap_or(&now);
        let tokens = leak(last_tokens, last_refreshed, rate, now);

        Ok(RateLimitState {
            limit: capacity as u64,
            remaining: (capacity - tokens).max(0.0) as u64,
            reset_after: Duration::from_secs_f64((tokens / rate).ceil()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> Store {
        Store::Memory(MemoryStore::new())
    }

    #[tokio::test]
    async fn admits_up_to_capacity_then_denies() {
        let store = store();
        let algo = LeakyBucket::new();
        let quota = Quota::per_second(10).with_burst(5);

        for i in 1..=5 {
            let d = algo.limit(&store, "user:1", &quota, 1).await.unwrap();
            assert!(d.is_allowed(), "request {i} should be allowed");
        }
        assert!(algo.limit(&store, "user:1", &quota, 1).await.unwrap().is_denied());
    }

    #[tokio::test]
    async fn drains_over_time() {
        let store = store();
        let algo = LeakyBucket::new();
        let quota = Quota::per_second(10).with_burst(2);

        algo.limit(&store, "user:1", &quota, 1).await.unwrap();
        algo.limit(&store, "user:1", &quota, 1).await.unwrap();
        assert!(algo.limit(&store, "user:1", &quota, 1).await.unwrap().is_denied());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(algo.limit(&store, "user:1", &quota, 1).await.unwrap().is_allowed());
    }
}
