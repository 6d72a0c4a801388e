//! Algorithm registry.
//!
//! Maps a stable `algorithm_id` string to the corresponding limiter. With the
//! closed [`crate::storage::Store`] enum (see `storage/mod.rs`), every
//! algorithm already handles both backends directly in its `limit`/`peek`
//! match arms, so there is no separate per-(algorithm, store) atomic-action
//! lookup to perform here — registration reduces to the `AlgorithmKind` enum
//! below plus an explicit, exhaustive `match` in [`AlgorithmKind::from_id`].
//! This is deliberate: see `DESIGN.md` for why a `HashMap<String, Ctor>`
//! populated by runtime registration calls would only add indirection without
//! adding safety here. No auto-discovery or reflection is used, per the
//! source's metaclass-registry being flagged for redesign.

use crate::algorithm::{FixedWindow, LeakyBucket, SlidingWindow, TokenBucket, GCRA};
use crate::error::{Result, SetUpError};

/// One of the five supported algorithms, resolved from a stable string id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    /// `fixed_window`
    FixedWindow,
    /// `sliding_window`
    SlidingWindow,
    /// `token_bucket`
    TokenBucket,
    /// `leaking_bucket`
    LeakingBucket,
    /// `gcra`
    Gcra,
}

impl AlgorithmKind {
    /// Resolve an algorithm id string to its `AlgorithmKind`, or `SetUpError::UnknownAlgorithm`.
    pub fn from_id(id: &str) -> Result<Self> {
        match id {
            "fixed_window" => Ok(Self::FixedWindow),
            "sliding_window" => Ok(Self::SlidingWindow),
            "token_bucket" => Ok(Self::TokenBucket),
            "leaking_bucket" => Ok(Self::LeakingBucket),
            "gcra" => Ok(Self::Gcra),
            other => Err(SetUpError::UnknownAlgorithm(other.to_string()).into()),
        }
    }

    /// The stable string id for this algorithm.
    pub fn id(&self) -> &'static str {
        match self {
            Self::FixedWindow => "fixed_window",
            Self::SlidingWindow => "sliding_window",
            Self::TokenBucket => "token_bucket",
            Self::LeakingBucket => "leaking_bucket",
            Self::Gcra => "gcra",
        }
    }
}

/// The five concrete limiter implementations, selected by [`AlgorithmKind`].
/// Each variant wraps a unit struct: all algorithm state lives in the backend,
/// not in the limiter value, so construction never fails once the id resolves.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Limiter {
    FixedWindow(FixedWindow),
    SlidingWindow(SlidingWindow),
    TokenBucket(TokenBucket),
    LeakingBucket(LeakyBucket),
    Gcra(GCRA),
}

impl Limiter {
    pub(crate) fn new(kind: AlgorithmKind) -> Self {
        match kind {
            AlgorithmKind::FixedWindow => Self::FixedWindow(FixedWindow::new()),
            AlgorithmKind::SlidingWindow => Self::SlidingWindow(SlidingWindow::new()),
            AlgorithmKind::TokenBucket => Self::TokenBucket(TokenBucket::new()),
            AlgorithmKind::LeakingBucket => Self::LeakingBucket(LeakyBucket::new()),
            AlgorithmKind::Gcra => Self::Gcra(GCRA::new()),
        }
    }

    pub(crate) async fn limit(
        &self,
        store: &crate::storage::Store,
        key: &str,
        quota: &crate::quota::Quota,
        cost: u64,
    ) -> Result<crate::decision::Decision> {
        match self {
            Self::FixedWindow(a) => a.limit(store, key, quota, cost).await,
            Self::SlidingWindow(a) => a.limit(store, key, quota, cost).await,
            Self::TokenBucket(a) => a.limit(store, key, quota, cost).await,
            Self::LeakingBucket(a) => a.limit(store, key, quota, cost).await,
            Self::Gcra(a) => a.limit(store, key, quota, cost).await,
        }
    }

    pub(crate) async fn peek(
        &self,
        store: &crate::storage::Store,
        key: &str,
        quota: &crate::quota::Quota,
    ) -> Result<crate::decision::RateLimitState> {
        match self {
            Self::FixedWindow(a) => a.peek(store, key, quota).await,
            Self::SlidingWindow(a) => a.peek(store, key, quota).await,
            Self::TokenBucket(a) => a.peek(store, key, quota).await,
            Self::LeakingBucket(a) => a.peek(store, key, quota).await,
            Self::Gcra(a) => a.peek(store, key, quota).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_all_five_ids() {
        for id in ["fixed_window", "sliding_window", "token_bucket", "leaking_bucket", "gcra"] {
            let kind = AlgorithmKind::from_id(id).unwrap();
            assert_eq!(kind.id(), id);
        }
    }

    #[test]
    fn rejects_unknown_id() {
        assert!(AlgorithmKind::from_id("bogus").is_err());
    }
}
