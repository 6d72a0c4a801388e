//! Remote key/value storage backend.
//!
//! Talks to a Redis-protocol server through a pooled connection. Raw ops map
//! directly onto single Redis commands; algorithms that require a genuinely
//! atomic multi-step update (token bucket, leaking bucket, GCRA) run a single
//! `EVAL`-backed [`deadpool_redis::redis::Script`] instead of composing raw ops,
//! since composing raw `get`/`set` calls here would not be atomic across the
//! round trip. Fixed window and sliding window use plain atomic commands
//! (`INCRBY`, conditional `EXPIRE`) because a single `INCRBY` is already
//! atomic and does not need a script to decide admission.

use std::collections::HashMap;
use std::time::Duration;

use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use tracing::{debug, warn};

use crate::error::{Result, StoreUnavailableError};

/// Remote backend connection configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Connection URL (e.g. `redis://localhost:6379`).
    pub url: String,
    /// Connection pool size.
    pub pool_size: usize,
}

impl RemoteConfig {
    /// Build a configuration pointing at `url` with default pool sizing.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: 10,
        }
    }

    /// Override the pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }
}

/// Remote key/value backend, backed by a pooled Redis-protocol client.
pub struct RemoteStore {
    pool: Pool,
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore").finish_non_exhaustive()
    }
}

impl RemoteStore {
    /// Connect using `config`, verifying the connection with a `PING`.
    pub async fn new(config: RemoteConfig) -> Result<Self> {
        let mut cfg = Config::from_url(&config.url);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(config.pool_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreUnavailableError::Io(e.to_string()))?;

        let mut conn = pool.get().await?;
        let _: () = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await?;

        debug!("connected to remote rate limit store");
        Ok(Self { pool })
    }

    /// Connect using just a URL and default pool settings.
    pub async fn from_url(url: impl Into<String>) -> Result<Self> {
        Self::new(RemoteConfig::new(url)).await
    }

    pub(crate) async fn conn(&self) -> Result<Connection> {
        self.pool.get().await.map_err(Into::into)
    }

    pub(crate) async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let n: i64 = conn.exists(key).await?;
        Ok(n > 0)
    }

    pub(crate) async fn ttl(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn().await?;
        let ttl: i64 = conn.ttl(key).await?;
        Ok(ttl)
    }

    pub(crate) async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.expire(key, ttl.as_secs().max(1) as i64).await?;
        Ok(())
    }

    pub(crate) async fn set(&self, key: &str, value: f64, ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    pub(crate) async fn get(&self, key: &str) -> Result<Option<f64>> {
        let mut conn = self.conn().await?;
        let v: Option<f64> = conn.get(key).await?;
        Ok(v)
    }

    pub(crate) async fn hset(&self, key: &str, fields: &[(&str, f64)]) -> Result<()> {
        let mut conn = self.conn().await?;
        let pairs: Vec<(&str, f64)> = fields.to_vec();
        let _: () = conn.hset_multiple(key, &pairs).await?;
        Ok(())
    }

    pub(crate) async fn hgetall(&self, key: &str) -> Result<HashMap<String, f64>> {
        let mut conn = self.conn().await?;
        let map: HashMap<String, f64> = conn.hgetall(key).await?;
        Ok(map)
    }

    /// Atomically increment `key` by `delta`; if the result equals `delta` (the
    /// key was just created) set its TTL to `ttl_on_create`. Used by fixed
    /// window and sliding window, for which `INCRBY` alone is already atomic.
    pub(crate) async fn incrby_with_ttl_on_create(
        &self,
        key: &str,
        delta: u64,
        ttl_on_create: Duration,
    ) -> Result<u64> {
        let mut conn = self.conn().await?;
        let current: u64 = conn.incr(key, delta).await?;
        if current == delta {
            let _: () = conn.expire(key, ttl_on_create.as_secs().max(1) as i64).await?;
        }
        Ok(current)
    }

    /// Run `script` with `keys`/`args`, returning raw numeric results.
    /// The caller owns `script`'s lifetime (a `static` per algorithm); the
    /// handle is cheap to reuse and Redis caches the compiled body server-side
    /// after the first `EVAL`.
    pub(crate) async fn eval_script(
        &self,
        script: &deadpool_redis::redis::Script,
        keys: &[&str],
        args: &[f64],
    ) -> Result<Vec<f64>> {
        let mut conn = self.conn().await?;
        let mut invocation = script.prepare_invoke();
        for k in keys {
            invocation.key(*k);
        }
        for a in args {
            invocation.arg(*a);
        }
        let raw: Vec<String> = invocation.invoke_async(&mut *conn).await.map_err(|e| {
            warn!(error = %e, "remote rate limit script failed");
            StoreUnavailableError::Script(e.to_string())
        })?;
        raw.into_iter()
            .map(|s| {
                s.parse::<f64>()
                    .map_err(|e| StoreUnavailableError::Script(e.to_string()).into())
            })
            .collect()
    }
}
