//! Error types for rate limiting operations.
//!
//! This module provides the error hierarchy for the throttling core: construction
//! faults, call-site argument faults, remote backend faults, and the decision-as-
//! exception form used by the scoped-use and callable-wrap adapters.

use thiserror::Error;

use crate::decision::Decision;

/// Result type for rate limiting operations.
pub type Result<T> = std::result::Result<T, ThrottledError>;

/// Base error type. Every fallible operation in this crate returns this type
/// (or a type convertible into it via `?`).
#[derive(Debug, Error)]
pub enum ThrottledError {
    /// Bad wiring discovered at construction time: unknown algorithm id, no
    /// atomic action registered for a (algorithm, store) pair, invalid
    /// capacity, or similar. Never retryable.
    #[error("set up error: {0}")]
    SetUp(#[from] SetUpError),

    /// Invalid arguments at call time: empty key, non-positive timeout,
    /// `hset` with no fields. Never retryable.
    #[error("data error: {0}")]
    Data(#[from] DataError),

    /// The remote backend was reachable but faulted (lost connection, script
    /// error, pool exhaustion). The caller may retry at its own discretion;
    /// this crate never retries a transport error transparently.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreUnavailableError),

    /// A decision came back denied in a context that treats denial as an
    /// exception (scoped use, callable wrap).
    #[error("rate limited: retry after {:.3}s", .decision.retry_after.as_secs_f64())]
    Limited {
        /// The full decision that triggered the denial.
        decision: Decision,
    },
}

impl ThrottledError {
    /// Build a [`ThrottledError::Limited`] from a denied decision.
    pub fn limited(decision: Decision) -> Self {
        Self::Limited { decision }
    }

    /// The carried decision, if this is a [`ThrottledError::Limited`].
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Self::Limited { decision } => Some(decision),
            _ => None,
        }
    }
}

/// Construction/wiring faults.
#[derive(Debug, Error)]
pub enum SetUpError {
    /// No limiter is registered under this algorithm id.
    #[error("unknown algorithm id: {0}")]
    UnknownAlgorithm(String),

    /// The store did not provide an atomic action of a kind the algorithm requires.
    #[error("missing atomic action '{kind}' for store '{store}'")]
    MissingAtomicAction {
        /// The atomic action kind that was required.
        kind: &'static str,
        /// The store identifier that lacked it.
        store: &'static str,
    },

    /// The memory backend was constructed with a non-positive capacity.
    #[error("invalid memory store capacity: {0} (must be positive)")]
    InvalidCapacity(i64),

    /// A quota was constructed with invalid fields (zero limit, zero burst, zero period).
    #[error("invalid quota: {0}")]
    InvalidQuota(String),

    /// Generic wiring failure, used for errors with no dedicated variant.
    #[error("{0}")]
    Other(String),
}

/// Invalid call-site arguments.
#[derive(Debug, Error)]
pub enum DataError {
    /// `limit`/`peek` was called with no resolvable key.
    #[error("no key supplied and no default key configured")]
    MissingKey,

    /// A timeout was supplied but was not a positive duration.
    #[error("timeout must be a positive duration, got {0:?}")]
    InvalidTimeout(std::time::Duration),

    /// `hset` was called without any field/value pair.
    #[error("hset requires at least one field")]
    EmptyHset,
}

/// Remote backend faults.
#[derive(Debug, Error)]
pub enum StoreUnavailableError {
    /// The connection pool could not hand out a connection.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// The underlying client reported a transport-level failure.
    #[error("remote backend I/O error: {0}")]
    Io(String),

    /// A server-side script failed to execute or returned an unexpected shape.
    #[error("remote script error: {0}")]
    Script(String),
}

#[cfg(feature = "redis")]
impl From<deadpool_redis::redis::RedisError> for ThrottledError {
    fn from(err: deadpool_redis::redis::RedisError) -> Self {
        ThrottledError::StoreUnavailable(StoreUnavailableError::Io(err.to_string()))
    }
}

#[cfg(feature = "redis")]
impl From<deadpool_redis::PoolError> for ThrottledError {
    fn from(_err: deadpool_redis::PoolError) -> Self {
        ThrottledError::StoreUnavailable(StoreUnavailableError::PoolExhausted)
    }
}
