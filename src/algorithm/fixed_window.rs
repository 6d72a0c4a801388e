//! Fixed window algorithm.
//!
//! Simplest of the five: one counter per period. Under concurrency, two
//! neighboring windows may each admit up to `limit`, so up to `2*limit`
//! requests can land within a sliding `period` at the boundary — this is
//! accepted, not a bug; pick sliding window or GCRA for a tighter bound.

use std::time::Duration;

use crate::decision::{Decision, RateLimitState};
use crate::error::Result;
use crate::keys::prepare_key;
use crate::quota::Quota;
use crate::storage::{now_sec, Store};

const ALGORITHM_ID: &str = "fixed_window";

/// Fixed window rate limiter.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedWindow;

impl FixedWindow {
    /// Construct a fixed window limiter.
    pub fn new() -> Self {
        Self
    }

    fn period_key(&self, key: &str, period_secs: u64, now: u64) -> String {
        let base = prepare_key(ALGORITHM_ID, key);
        let period_index = now / period_secs;
        format!("{base}:period:{period_index}")
    }

    /// Check whether the request is allowed and record it atomically.
    pub async fn limit(&self, store: &Store, key: &str, quota: &Quota, cost: u64) -> Result<Decision> {
        let period_secs = quota.period().as_secs().max(1);
        let limit = quota.limit();
        let now = now_sec();
        let period_key = self.period_key(key, period_secs, now);

        let current = match store {
            Store::Memory(m) => m.incr_with_ttl_on_create(&period_key, cost, quota.period()).await?,
            #[cfg(feature = "redis")]
            Store::Remote(r) => {
                r.incrby_with_ttl_on_create(&period_key, cost, quota.period())
                    .await?
            }
        };

        let reset_after = Duration::from_secs(period_secs - (now % period_secs));
        let limited = current > limit;
        let remaining = limit.saturating_sub(current);
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
        let period_key = self.period_key(key, period_secs, now);

        let current = store.get(&period_key).await?.unwrap_or(0.0) as u64;
        let reset_after = Duration::from_secs(period_secs - (now % period_secs));

        Ok(RateLimitState {
            limit,
            remaining: limit.saturating_sub(current),
            reset_after,
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
    async fn admits_up_to_limit_then_denies() {
        let store = store();
        let algo = FixedWindow::new();
        let quota = Quota::per_minute(5);

        for expected_remaining in [4u64, 3, 2, 1, 0] {
            let d = algo.limit(&store, "user:1", &quota, 1).await.unwrap();
            assert!(d.is_allowed());
            assert_eq!(d.remaining, expected_remaining);
        }

        let d = algo.limit(&store, "user:1", &quota, 1).await.unwrap();
        assert!(d.is_denied());
        assert_eq!(d.remaining, 0);
        assert_eq!(d.retry_after, d.reset_after);
    }

    #[tokio::test]
    async fn separate_keys_do_not_interfere() {
        let store = store();
        let algo = FixedWindow::new();
        let quota = Quota::per_minute(1);

        assert!(algo.limit(&store, "a", &quota, 1).await.unwrap().is_allowed());
        assert!(algo.limit(&store, "b", &quota, 1).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn peek_does_not_mutate_state() {
        let store = store();
        let algo = FixedWindow::new();
        let quota = Quota::per_minute(5);

        algo.limit(&store, "user:1", &quota, 1).await.unwrap();
        let first_peek = algo.peek(&store, "user:1", &quota).await.unwrap();
        let second_peek = algo.peek(&store, "user:1", &quota).await.unwrap();
        assert_eq!(first_peek.remaining, second_peek.remaining);
        assert_eq!(first_peek.remaining, 4);
    }
}
