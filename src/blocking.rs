//! Synchronous mirror of [`crate::throttle::Throttle`].
//!
//! The core façade is async-first; this module wraps it in a dedicated
//! single-threaded Tokio runtime so callers on plain OS threads can use the
//! same quota/algorithm/store configuration without an executor of their
//! own. Per the "cooperative vs parallel" design note, a [`BlockingThrottle`]
//! owns its runtime and its [`Throttle`] outright — it is never constructed
//! from, nor shared with, an async instance already driven by someone else's
//! executor.

use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::decision::{Decision, RateLimitState};
use crate::error::Result;
use crate::hooks::Hook;
use crate::quota::Quota;
use crate::registry::AlgorithmKind;
use crate::storage::Store;
use crate::throttle::Throttle;

/// Blocking façade over [`Throttle`]. Every method runs the async
/// implementation to completion on an internal current-thread runtime, so
/// calls from this type block the calling OS thread rather than suspend.
pub struct BlockingThrottle {
    runtime: Runtime,
    inner: Throttle,
}

impl BlockingThrottle {
    /// Start building a blocking façade over `store`.
    pub fn builder(store: Store) -> BlockingThrottleBuilder {
        BlockingThrottleBuilder::new(store)
    }

    /// Blocking mirror of [`Throttle::limit`].
    pub fn limit(&self, key: Option<&str>, cost: Option<u64>, timeout: Option<Duration>) -> Result<Decision> {
        self.runtime.block_on(self.inner.limit(key, cost, timeout))
    }

    /// Blocking mirror of [`Throttle::peek`].
    pub fn peek(&self, key: Option<&str>) -> Result<RateLimitState> {
        self.runtime.block_on(self.inner.peek(key))
    }

    /// Blocking mirror of [`Throttle::enter`].
    pub fn enter(&self) -> Result<Decision> {
        self.runtime.block_on(self.inner.enter())
    }
}

/// Builder for [`BlockingThrottle`], mirroring [`crate::throttle::ThrottleBuilder`].
pub struct BlockingThrottleBuilder {
    default_key: Option<String>,
    algorithm: AlgorithmKind,
    quota: Quota,
    store: Store,
    timeout: Option<Duration>,
    cost: u64,
    hooks: Vec<std::sync::Arc<dyn Hook>>,
}

impl BlockingThrottleBuilder {
    fn new(store: Store) -> Self {
        Self {
            default_key: None,
            algorithm: AlgorithmKind::TokenBucket,
            quota: Quota::default(),
            store,
            timeout: None,
            cost: 1,
            hooks: Vec::new(),
        }
    }

    /// Set the default key used when a call omits one.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.default_key = Some(key.into());
        self
    }

    /// Select the algorithm by its stable id.
    pub fn algorithm_id(mut self, id: &str) -> Result<Self> {
        self.algorithm = AlgorithmKind::from_id(id)?;
        Ok(self)
    }

    /// Select the algorithm directly.
    pub fn algorithm(mut self, algorithm: AlgorithmKind) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the quota. Defaults to 60 per minute.
    pub fn quota(mut self, quota: Quota) -> Self {
        self.quota = quota;
        self
    }

    /// Set the default wait timeout for denied requests.
    pub fn timeout(mut self, timeout: Duration) -> Result<Self> {
        use crate::error::DataError;
        if timeout.is_zero() {
            return Err(DataError::InvalidTimeout(timeout).into());
        }
        self.timeout = Some(timeout);
        Ok(self)
    }

    /// Set the default cost per request. Defaults to 1.
    pub fn cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }

    /// Append a hook to the chain, outermost-first.
    pub fn hook(mut self, hook: std::sync::Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Finish building the façade, creating a dedicated current-thread runtime.
    pub fn build(self) -> Result<BlockingThrottle> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| crate::error::SetUpError::Other(e.to_string()))?;

        let mut inner = Throttle::builder(self.store)
            .algorithm(self.algorithm)
            .quota(self.quota)
            .cost(self.cost);
        if let Some(key) = self.default_key {
            inner = inner.key(key);
        }
        if let Some(timeout) = self.timeout {
            inner = inner.timeout(timeout)?;
        }
        for hook in self.hooks {
            inner = inner.hook(hook);
        }

        Ok(BlockingThrottle {
            runtime,
            inner: inner.build(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn blocking_throttle_admits_then_denies() {
        let throttle = BlockingThrottle::builder(Store::Memory(MemoryStore::new()))
            .algorithm(AlgorithmKind::FixedWindow)
            .quota(Quota::per_minute(1))
            .key("user:1")
            .build()
            .unwrap();

        assert!(throttle.limit(None, None, None).unwrap().is_allowed());
        assert!(throttle.limit(None, None, None).unwrap().is_denied());
    }

    #[test]
    fn blocking_peek_does_not_mutate() {
        let throttle = BlockingThrottle::builder(Store::Memory(MemoryStore::new()))
            .algorithm(AlgorithmKind::TokenBucket)
            .quota(Quota::per_minute(10))
            .key("user:1")
            .build()
            .unwrap();

        throttle.limit(None, None, None).unwrap();
        let before = throttle.peek(None).unwrap();
        let after = throttle.peek(None).unwrap();
        assert_eq!(before.remaining, after.remaining);
    }
}
