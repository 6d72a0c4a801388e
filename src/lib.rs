//! Rate limiting core: five interchangeable algorithms over two pluggable
//! storage backends, behind one uniform decision API.
//!
//! `throttle-core` decides, for each request identified by a caller-supplied
//! key, whether the request may proceed now, must wait, or must be rejected.
//!
//! - **Five algorithms**: fixed window, sliding window, token bucket, leaking
//!   bucket, GCRA — all always compiled, selected by id or directly.
//! - **Two backends**: an in-process bounded-LRU memory store, or a remote
//!   Redis-protocol store behind the `redis` feature.
//! - **One façade**: [`Throttle`] composes key/timeout resolution, the
//!   retry-wait loop, and an observability hook chain around every decision.
//!
//! # Quick start
//!
//! ```ignore
//! use throttle_core::{Quota, Store, MemoryStore, Throttle, AlgorithmKind};
//!
//! #[tokio::main]
//! async fn main() {
//!     let throttle = Throttle::builder(Store::Memory(MemoryStore::new()))
//!         .algorithm(AlgorithmKind::TokenBucket)
//!         .quota(Quota::per_second(10).with_burst(15))
//!         .build();
//!
//!     let decision = throttle.limit(Some("user:123"), None, None).await.unwrap();
//!     if decision.is_allowed() {
//!         println!("admitted, {} remaining", decision.remaining);
//!     } else {
//!         println!("denied, retry after {:?}", decision.retry_after);
//!     }
//! }
//! ```
//!
//! # Algorithms
//!
//! | Algorithm | Accuracy | Memory | Burst | Best for |
//! |-----------|----------|--------|-------|----------|
//! | Fixed window | Low | Low (1 counter) | Poor | Simple use cases |
//! | Sliding window | Medium | Low (2 counters) | Good | General purpose |
//! | Token bucket | High | Low | Excellent | Bursty traffic |
//! | Leaking bucket | High | Low | None | Smooth output |
//! | GCRA | Highest | Low (1 timestamp) | Controlled | Precise rate control |
//!
//! # Feature flags
//!
//! - `memory` (default): in-process bounded-LRU storage.
//! - `redis`: remote Redis-protocol storage via `deadpool-redis`.

pub mod algorithm;
pub mod blocking;
pub mod decision;
pub mod error;
pub mod hooks;
pub mod keys;
pub mod quota;
pub mod registry;
pub mod storage;
pub mod throttle;

pub use blocking::{BlockingThrottle, BlockingThrottleBuilder};
pub use decision::{Decision, RateLimitState};
pub use error::{DataError, Result, SetUpError, StoreUnavailableError, ThrottledError};
pub use hooks::{CallNext, Hook, HookContext};
pub use quota::{Quota, QuotaBuilder};
pub use registry::AlgorithmKind;
pub use storage::{MemoryStore, Store, StoreKind};
pub use throttle::{Throttle, ThrottleBuilder};

#[cfg(feature = "redis")]
pub use storage::{RemoteConfig, RemoteStore};

pub use algorithm::{FixedWindow, LeakyBucket, SlidingWindow, TokenBucket, GCRA};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::decision::{Decision, RateLimitState};
    pub use crate::error::{Result, ThrottledError};
    pub use crate::quota::Quota;
    pub use crate::registry::AlgorithmKind;
    pub use crate::storage::{MemoryStore, Store};
    pub use crate::throttle::{Throttle, ThrottleBuilder};

    #[cfg(feature = "redis")]
    pub use crate::storage::{RemoteConfig, RemoteStore};

    pub use crate::algorithm::{FixedWindow, LeakyBucket, SlidingWindow, TokenBucket, GCRA};
}
