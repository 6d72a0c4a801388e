//! Storage backends for rate limiter state.
//!
//! Exactly two backends are supported: an in-process bounded-LRU [`MemoryStore`]
//! and a [`RemoteStore`] talking to a remote key/value server over Redis-shaped
//! commands. Both are folded into the [`Store`] enum rather than a trait object,
//! since the set of backends is closed by design (see `DESIGN.md`): algorithms
//! match on `Store` and call the backend-specific atomic primitive directly,
//! which is what actually carries the indivisibility guarantee (a held mutex on
//! the memory side, a single `EVAL` on the remote side).

pub(crate) mod memory;
#[cfg(feature = "redis")]
pub(crate) mod remote;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use remote::{RemoteConfig, RemoteStore};

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{DataError, Result};

/// Identifies which backend a `Store` wraps. Used for hook context and for the
/// `reset_after`/atomicity notes in error messages and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// In-process bounded LRU.
    Memory,
    /// Remote key/value server with server-side scripting.
    Remote,
}

impl StoreKind {
    /// Stable string identifier, used in the backend's key prefix derivation
    /// and in hook contexts.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Remote => "redis",
        }
    }
}

/// One of the two pluggable storage backends.
pub enum Store {
    /// In-process bounded LRU backend.
    Memory(MemoryStore),
    /// Remote key/value backend.
    #[cfg(feature = "redis")]
    Remote(RemoteStore),
}

impl Store {
    /// Which kind of backend this is.
    pub fn kind(&self) -> StoreKind {
        match self {
            Store::Memory(_) => StoreKind::Memory,
            #[cfg(feature = "redis")]
            Store::Remote(_) => StoreKind::Remote,
        }
    }

    /// True iff `key` is present and not expired.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self {
            Store::Memory(m) => m.exists(key).await,
            #[cfg(feature = "redis")]
            Store::Remote(r) => r.exists(key).await,
        }
    }

    /// Seconds remaining on `key`'s TTL. `-2` if absent, `-1` if present without expiry.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        match self {
            Store::Memory(m) => m.ttl(key).await,
            #[cfg(feature = "redis")]
            Store::Remote(r) => r.ttl(key).await,
        }
    }

    /// Set `key`'s expiry to `now + ttl`. `ttl` must be positive.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        validate_ttl(ttl)?;
        match self {
            Store::Memory(m) => m.expire(key, ttl).await,
            #[cfg(feature = "redis")]
            Store::Remote(r) => r.expire(key, ttl).await,
        }
    }

    /// Upsert `key` with a numeric value and expiry `ttl`.
    pub async fn set(&self, key: &str, value: f64, ttl: Duration) -> Result<()> {
        validate_ttl(ttl)?;
        match self {
            Store::Memory(m) => m.set(key, value, ttl).await,
            #[cfg(feature = "redis")]
            Store::Remote(r) => r.set(key, value, ttl).await,
        }
    }

    /// The numeric value at `key`, or `None` if absent/expired.
    pub async fn get(&self, key: &str) -> Result<Option<f64>> {
        match self {
            Store::Memory(m) => m.get(key).await,
            #[cfg(feature = "redis")]
            Store::Remote(r) => r.get(key).await,
        }
    }

    /// Upsert a batch of hash fields. `fields` must be non-empty.
    pub async fn hset(&self, key: &str, fields: &[(&str, f64)]) -> Result<()> {
        if fields.is_empty() {
            return Err(DataError::EmptyHset.into());
        }
        match self {
            Store::Memory(m) => m.hset(key, fields).await,
            #[cfg(feature = "redis")]
            Store::Remote(r) => r.hset(key, fields).await,
        }
    }

    /// The full hash map stored at `key` (empty if absent).
    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, f64>> {
        match self {
            Store::Memory(m) => m.hgetall(key).await,
            #[cfg(feature = "redis")]
            Store::Remote(r) => r.hgetall(key).await,
        }
    }
}

pub(crate) fn validate_ttl(ttl: Duration) -> Result<()> {
    if ttl.is_zero() {
        return Err(DataError::InvalidTimeout(ttl).into());
    }
    Ok(())
}

/// Current unix time in whole seconds.
pub(crate) fn now_sec() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Current unix time in whole milliseconds.
pub(crate) fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}

/// Current unix time as real-valued seconds (for GCRA on the memory backend).
pub(crate) fn now_f64() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs_f64()
}
