//! The throttle façade: holds configuration and implements `limit()`/`peek()`
//! with wait-and-retry and hook-chain composition.
//!
//! Mirrors the source's `Throttled(key, using, quota, store)` entry point:
//! configuration is fixed at construction, the limiter is resolved lazily
//! from the registry on first use, and every call composes the hook chain
//! over the *entire* retry loop rather than once per attempt.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::decision::{Decision, RateLimitState};
use crate::error::{DataError, Result, ThrottledError};
use crate::hooks::{build_hook_chain, Hook, HookContext};
use crate::quota::Quota;
use crate::registry::{AlgorithmKind, Limiter};
use crate::storage::Store;

/// Rate limiter façade. Construct with [`ThrottleBuilder`], then call
/// [`Throttle::limit`] or [`Throttle::peek`].
pub struct Throttle {
    default_key: Option<String>,
    algorithm: AlgorithmKind,
    quota: Quota,
    store: Store,
    timeout: Option<Duration>,
    cost: u64,
    hooks: Vec<Arc<dyn Hook>>,
    limiter: OnceLock<Limiter>,
}

impl Throttle {
    /// Start building a façade over `store`.
    pub fn builder(store: Store) -> ThrottleBuilder {
        ThrottleBuilder::new(store)
    }

    fn limiter(&self) -> &Limiter {
        self.limiter.get_or_init(|| Limiter::new(self.algorithm))
    }

    fn resolve_key<'a>(&'a self, key: Option<&'a str>) -> Result<&'a str> {
        key.filter(|k| !k.is_empty())
            .or(self.default_key.as_deref())
            .ok_or_else(|| DataError::MissingKey.into())
    }

    fn resolve_timeout(&self, timeout: Option<Duration>) -> Result<Option<Duration>> {
        let timeout = timeout.or(self.timeout);
        if let Some(t) = timeout {
            if t.is_zero() {
                return Err(DataError::InvalidTimeout(t).into());
            }
        }
        Ok(timeout)
    }

    /// Check whether a request of `cost` units is allowed, waiting up to
    /// `timeout` (or the façade's configured default) if initially denied.
    ///
    /// `key`/`cost`/`timeout` override the façade's configured defaults for
    /// this call only. Hooks wrap the entire retry loop: they run exactly
    /// once per `limit()` call, not once per retry attempt.
    pub async fn limit(
        &self,
        key: Option<&str>,
        cost: Option<u64>,
        timeout: Option<Duration>,
    ) -> Result<Decision> {
        let key = self.resolve_key(key)?.to_string();
        let timeout = self.resolve_timeout(timeout)?;
        let cost = cost.unwrap_or(self.cost);

        let context = HookContext {
            key: key.clone(),
            cost,
            algorithm_id: self.algorithm.id(),
            store_kind: self.store.kind(),
        };

        let limiter = self.limiter();
        let quota = &self.quota;
        let store = &self.store;

        build_hook_chain(
            &self.hooks,
            move || -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Decision>> + Send + '_>> {
                let key = key.clone();
                Box::pin(async move { self.retry_loop(limiter, store, &key, quota, cost, timeout).await })
            },
            &context,
        )
        .await
    }

    async fn retry_loop(
        &self,
        limiter: &Limiter,
        store: &Store,
        key: &str,
        quota: &Quota,
        cost: u64,
        timeout: Option<Duration>,
    ) -> Result<Decision> {
        let mut budget = timeout;

        loop {
            let decision = limiter.limit(store, key, quota, cost).await?;
            if decision.is_allowed() {
                return Ok(decision);
            }

            let Some(remaining) = budget else {
                return Ok(decision);
            };
            if decision.retry_after > remaining {
                debug!(
                    key,
                    retry_after = ?decision.retry_after,
                    remaining_budget = ?remaining,
                    "retry_after exceeds remaining timeout budget, returning denial"
                );
                return Ok(decision);
            }

            debug!(key, wait = ?decision.retry_after, "waiting before retry");
            tokio::time::sleep(decision.retry_after).await;
            budget = Some(remaining - decision.retry_after);
        }
    }

    /// Observe the current state of `key` without mutating it.
    pub async fn peek(&self, key: Option<&str>) -> Result<RateLimitState> {
        let key = self.resolve_key(key)?;
        self.limiter().peek(&self.store, key, &self.quota).await
    }

    /// Scoped-acquisition form: call `limit()` with the configured defaults and
    /// turn a denial into `ThrottledError::Limited`. On success, returns the
    /// admitting `Decision`; there is nothing to release afterward.
    pub async fn enter(&self) -> Result<Decision> {
        let decision = self.limit(None, None, None).await?;
        if decision.is_denied() {
            return Err(ThrottledError::limited(decision));
        }
        Ok(decision)
    }

    /// Callable-wrap form: run `f` only if `limit()` admits the call, else
    /// return `ThrottledError::Limited` without invoking `f`.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        self.enter().await?;
        Ok(f().await)
    }
}

/// Builder for [`Throttle`]. Mirrors `QuotaBuilder`'s eager-validation style.
pub struct ThrottleBuilder {
    default_key: Option<String>,
    algorithm: AlgorithmKind,
    quota: Quota,
    store: Store,
    timeout: Option<Duration>,
    cost: u64,
    hooks: Vec<Arc<dyn Hook>>,
}

impl ThrottleBuilder {
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

    /// Select the algorithm by its stable id (see [`AlgorithmKind::from_id`]).
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
    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Finish building the façade.
    pub fn build(self) -> Throttle {
        if self.default_key.is_none() {
            warn!("Throttle built with no default key; every call must supply one");
        }
        Throttle {
            default_key: self.default_key,
            algorithm: self.algorithm,
            quota: self.quota,
            store: self.store,
            timeout: self.timeout,
            cost: self.cost,
            hooks: self.hooks,
            limiter: OnceLock::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_store() -> Store {
        Store::Memory(MemoryStore::new())
    }

    #[tokio::test]
    async fn admits_then_denies_without_timeout() {
        let throttle = Throttle::builder(memory_store())
            .algorithm(AlgorithmKind::FixedWindow)
            .quota(Quota::per_minute(2))
            .key("user:1")
            .build();

        assert!(throttle.limit(None, None, None).await.unwrap().is_allowed());
        assert!(throttle.limit(None, None, None).await.unwrap().is_allowed());
        assert!(throttle.limit(None, None, None).await.unwrap().is_denied());
    }

    #[tokio::test]
    async fn missing_key_is_data_error() {
        let throttle = Throttle::builder(memory_store())
            .algorithm(AlgorithmKind::FixedWindow)
            .quota(Quota::per_minute(2))
            .build();

        let err = throttle.limit(None, None, None).await.unwrap_err();
        assert!(matches!(err, ThrottledError::Data(DataError::MissingKey)));
    }

    #[tokio::test]
    async fn waits_within_timeout_budget() {
        let throttle = Throttle::builder(memory_store())
            .algorithm(AlgorithmKind::TokenBucket)
            .quota(Quota::per_second(10).with_burst(1))
            .key("user:1")
            .timeout(Duration::from_millis(500))
            .unwrap()
            .build();

        assert!(throttle.limit(None, None, None).await.unwrap().is_allowed());
        let decision = throttle.limit(None, None, None).await.unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn enter_raises_limited_error_on_denial() {
        let throttle = Throttle::builder(memory_store())
            .algorithm(AlgorithmKind::FixedWindow)
            .quota(Quota::per_minute(1))
            .key("user:1")
            .build();

        throttle.enter().await.unwrap();
        let err = throttle.enter().await.unwrap_err();
        assert!(matches!(err, ThrottledError::Limited { .. }));
    }

    #[tokio::test]
    async fn call_skips_function_when_limited() {
        let throttle = Throttle::builder(memory_store())
            .algorithm(AlgorithmKind::FixedWindow)
            .quota(Quota::per_minute(1))
            .key("user:1")
            .build();

        let calls = AtomicUsize::new(0);
        let _ = throttle.call(|| async { calls.fetch_add(1, Ordering::SeqCst) }).await;
        let result = throttle.call(|| async { calls.fetch_add(1, Ordering::SeqCst) }).await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
