//! In-process bounded-LRU storage backend.
//!
//! A single [`tokio::sync::Mutex`] serializes every mutating operation and every
//! atomic action step against this store, exactly as a single reentrant lock
//! does in the reference implementation this crate's algorithms are modeled on.
//! It is a cooperative lock, not an OS-thread one: a task waiting on it yields
//! back to the executor instead of blocking a thread, so this store never
//! serves more than one task's worth of work at a time but never parks a
//! thread either. Readers take the lock too, since `get` performs lazy expiry
//! and LRU reordering.

use std::collections::HashMap;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::error::{Result, SetUpError};
use crate::storage::now_sec;

/// Default capacity when [`MemoryStore::new`] is used.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub(crate) enum Value {
    Scalar(f64),
    Hash(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) value: Value,
    pub(crate) expires_at: Option<u64>,
}

impl Entry {
    fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }
}

/// Bounded-LRU in-process storage backend.
pub struct MemoryStore {
    cache: Mutex<LruCache<String, Entry>>,
}

impl MemoryStore {
    /// Construct a store with the default capacity ([`DEFAULT_CAPACITY`]).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY).expect("default capacity is always valid")
    }

    /// Construct a store with an explicit capacity. Fails with `SetUpError` if
    /// `capacity` is not positive.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let capacity = std::num::NonZeroUsize::new(capacity)
            .ok_or(SetUpError::InvalidCapacity(capacity as i64))?;
        Ok(Self {
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Lock the cache for the duration of an atomic multi-step operation.
    /// Used directly by algorithm modules to guarantee indivisibility.
    pub(crate) async fn lock(&self) -> tokio::sync::MutexGuard<'_, LruCache<String, Entry>> {
        self.cache.lock().await
    }

    pub(crate) async fn exists(&self, key: &str) -> Result<bool> {
        let now = now_sec();
        let mut cache = self.cache.lock().await;
        Ok(match cache.peek(key) {
            Some(entry) if !entry.is_expired(now) => true,
            Some(_) => {
                cache.pop(key);
                false
            }
            None => false,
        })
    }

    pub(crate) async fn ttl(&self, key: &str) -> Result<i64> {
        let now = now_sec();
        let mut cache = self.cache.lock().await;
        match cache.peek(key) {
            None => Ok(-2),
            Some(entry) if entry.is_expired(now) => {
                cache.pop(key);
                Ok(-2)
            }
            Some(Entry {
                expires_at: None, ..
            }) => Ok(-1),
            Some(Entry {
                expires_at: Some(exp),
                ..
            }) => Ok((*exp as i64 - now as i64).max(0)),
        }
    }

    pub(crate) async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.get_mut(key) {
            entry.expires_at = Some(now_sec() + ttl.as_secs().max(1));
        }
        Ok(())
    }

    /// Atomically increment `key` by `delta`; if the result equals `delta` (the
    /// key was just created in this call) its TTL is set to `ttl_on_create`,
    /// otherwise the existing TTL is left untouched. Shared by fixed window
    /// and sliding window, which both need a plain "create-or-bump" counter.
    pub(crate) async fn incr_with_ttl_on_create(
        &self,
        key: &str,
        delta: u64,
        ttl_on_create: Duration,
    ) -> Result<u64> {
        let now = now_sec();
        let mut cache = self.cache.lock().await;
        match cache.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                if let Value::Scalar(v) = &mut entry.value {
                    *v += delta as f64;
                    Ok(*v as u64)
                } else {
                    *entry = Entry {
                        value: Value::Scalar(delta as f64),
                        expires_at: Some(now + ttl_on_create.as_secs().max(1)),
                    };
                    Ok(delta)
                }
            }
            _ => {
                cache.put(
                    key.to_string(),
                    Entry {
                        value: Value::Scalar(delta as f64),
                        expires_at: Some(now + ttl_on_create.as_secs().max(1)),
                    },
                );
                Ok(delta)
            }
        }
    }

    pub(crate) async fn set(&self, key: &str, value: f64, ttl: Duration) -> Result<()> {
        let mut cache = self.cache.lock().await;
        cache.put(
            key.to_string(),
            Entry {
                value: Value::Scalar(value),
                expires_at: Some(now_sec() + ttl.as_secs().max(1)),
            },
        );
        Ok(())
    }

    pub(crate) async fn get(&self, key: &str) -> Result<Option<f64>> {
        let now = now_sec();
        let mut cache = self.cache.lock().await;
        match cache.get_mut(key) {
            Some(entry) if entry.is_expired(now) => {
                cache.pop(key);
                Ok(None)
            }
            Some(Entry {
                value: Value::Scalar(v),
                ..
            }) => Ok(Some(*v)),
            Some(Entry {
                value: Value::Hash(_),
                ..
            }) => Ok(None),
            None => Ok(None),
        }
    }

    pub(crate) async fn hset(&self, key: &str, fields: &[(&str, f64)]) -> Result<()> {
        let mut cache = self.cache.lock().await;
        match cache.get_mut(key) {
            Some(entry) if !entry.is_expired(now_sec()) => {
                if let Value::Hash(map) = &mut entry.value {
                    for (field, v) in fields {
                        map.insert((*field).to_string(), *v);
                    }
                } else {
                    let mut map = HashMap::new();
                    for (field, v) in fields {
                        map.insert((*field).to_string(), *v);
                    }
                    entry.value = Value::Hash(map);
                }
            }
            _ => {
                let mut map = HashMap::new();
                for (field, v) in fields {
                    map.insert((*field).to_string(), *v);
                }
                cache.put(
                    key.to_string(),
                    Entry {
                        value: Value::Hash(map),
                        expires_at: None,
                    },
                );
            }
        }
        Ok(())
    }

    pub(crate) async fn hgetall(&self, key: &str) -> Result<HashMap<String, f64>> {
        let now = now_sec();
        let mut cache = self.cache.lock().await;
        match cache.get_mut(key) {
            Some(entry) if entry.is_expired(now) => {
                cache.pop(key);
                Ok(HashMap::new())
            }
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => Ok(map.clone()),
            _ => Ok(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
