//! Token bucket algorithm.
//!
//! A bucket holds up to `burst` tokens and refills at `rate = limit / period`
//! tokens per second. A request of `cost` tokens is admitted iff the bucket
//! currently holds at least `cost`.

use std::time::Duration;

use crate::decision::{Decision, RateLimitState};
use crate::error::Result;
use crate::keys::prepare_key;
use crate::quota::Quota;
use crate::storage::{now_sec, Store};

const ALGORITHM_ID: &str = "token_bucket";

#[cfg(feature = "redis")]
static LIMIT_SCRIPT: std::sync::LazyLock<deadpool_redis::redis::Script> =
    std::sync::LazyLock::new(|| {
        deadpool_redis::redis::Script::new(
            r#"
            local rate = tonumber(ARGV[1])
            local capacity = tonumber(ARGV[2])
            local cost = tonumber(ARGV[3])
            local now = tonumber(ARGV[4])

            local last_tokens = capacity
            local last_refreshed = now
            local bucket = redis.call("HMGET", KEYS[1], "tokens", "last_refreshed")

            if bucket[1] ~= false then
                last_tokens = tonumber(bucket[1])
                last_refreshed = tonumber(bucket[2])
            end

            local time_elapsed = math.max(0, now - last_refreshed)
            local tokens = math.min(capacity, last_tokens + (math.floor(time_elapsed * rate)))

            local limited = cost > tokens
            if limited then
                return {tostring(1), tostring(tokens)}
            end

            tokens = tokens - cost
            local fill_time = capacity / rate
            redis.call("HSET", KEYS[1], "tokens", tokens, "last_refreshed", now)
            redis.call("EXPIRE", KEYS[1], math.floor(2 * fill_time))

            return {tostring(0), tostring(tokens)}
            "#,
        )
    });

fn refill(last_tokens: f64, last_refreshed: f64, rate: f64, capacity: f64, now: f64) -> f64 {
    let elapsed = (now - last_refreshed).max(0.0);
    (last_tokens + (elapsed * rate).floor()).min(capacity)
}

/// Token bucket rate limiter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenBucket;

impl TokenBucket {
    /// Construct a token bucket limiter.
    pub fn new() -> Self {
        Self
    }

    /// Check whether the request is allowed and record it atomically.
    pub async fn limit(&self, store: &Store, key: &str, quota: &Quota, cost: u64) -> Result<Decision> {
        let rate = quota.rate();
        let capacity = quota.burst() as f64;
        let now = now_sec() as f64;
        let formatted_key = prepare_key(ALGORITHM_ID, key);

        let (limited, tokens) = match store {
            Store::Memory(m) => {
                let mut cache = m.lock().await;
                let bucket = cache.get_mut(&formatted_key);
                let (last_tokens, last_refreshed) = match bucket {
                    Some(entry) => match &entry.value {
                        crate::storage::memory::Value::Hash(map) => (
                            *map.get("tokens").unwrap_or(&capacity),
                            *map.get("last_refreshed").unwrap_or(&now),
                        ),
                        _ => (capacity, now),
                    },
                    None => (capacity, now),
                };

                let tokens = refill(last_tokens, last_refreshed, rate, capacity, now);
                let limited = cost as f64 > tokens;
                if !limited {
                    let remaining = tokens - cost as f64;
                    let fill_time = capacity / rate;
                    let mut map = std::collections::HashMap::new();
                    map.insert("tokens".to_string(), remaining);
                    map.insert("last_refreshed".to_string(), now);
                    cache.put(
                        formatted_key.clone(),
                        crate::storage::memory::Entry {
                            value: crate::storage::memory::Value::Hash(map),
                            expires_at: Some(now_sec() + (2.0 * fill_time).floor().max(1.0) as u64),
                        },
                    );
                    (false, remaining)
                } else {
                    (true, tokens)
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

        let reset_after = Duration::from_secs_f64(((capacity - tokens) / rate).max(0.0).ceil());
        let retry_after = if limited {
            Duration::from_secs_f64(((cost as f64 - tokens) / rate).max(0.0).ceil())
        } else {
            Duration::ZERO
        };

        Ok(Decision {
            limited,
            limit: capacity as u64,
            remaining: tokens as u64,
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
        let last_tokens = *bucket.get("tokens").unwrap_or(&capacity);
        let last_refreshed = *bucket.get("last_refreshed").unwrap_or(&now);
        let tokens = refill(last_tokens, last_refreshed, rate, capacity, now);

        Ok(RateLimitState {
            limit: capacity as u64,
            remaining: tokens as u64,
            reset_after: Duration::from_secs_f64(((capacity - tokens) / rate).max(0.0).ceil()),
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
    async fn admits_up_to_burst_then_denies() {
        let store = store();
        let algo = TokenBucket::new();
        let quota = Quota::per_minute(5).with_burst(5);

        for i in 1..=5 {
            let d = algo.limit(&store, "user:1", &quota, 1).await.unwrap();
            assert!(d.is_allowed(), "request {i} should be allowed");
        }
        let d = algo.limit(&store, "user:1", &quota, 1).await.unwrap();
        assert!(d.is_denied());
    }

    #[tokio::test]
    async fn refills_over_time() {
        let store = store();
        let algo = TokenBucket::new();
        let quota = Quota::per_second(10).with_burst(1);

        assert!(algo.limit(&store, "user:1", &quota, 1).await.unwrap().is_allowed());
        assert!(algo.limit(&store, "user:1", &quota, 1).await.unwrap().is_denied());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(algo.limit(&store, "user:1", &quota, 1).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn peek_does_not_consume_tokens() {
        let store = store();
        let algo = TokenBucket::new();
        let quota = Quota::per_minute(5).with_burst(5);

        algo.limit(&store, "user:1", &quota, 1).await.unwrap();
        let before = algo.peek(&store, "user:1", &quota).await.unwrap();
        let after = algo.peek(&store, "user:1", &quota).await.unwrap();
        assert_eq!(before.remaining, after.remaining);
    }
}
