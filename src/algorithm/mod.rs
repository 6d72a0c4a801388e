//! Rate limiting algorithm implementations.
//!
//! All five algorithms are always compiled: fixed window, sliding window,
//! token bucket, leaking bucket, and GCRA. Each takes a [`crate::storage::Store`]
//! directly rather than a generic storage trait, since the `Store` enum (not a
//! trait object) is what actually carries the atomicity guarantee per backend.
//!
//! | Algorithm | Accuracy | Memory | Burst | Best for |
//! |-----------|----------|--------|-------|----------|
//! | Fixed window | Low | Low (1 counter) | Poor | Simple use cases |
//! | Sliding window | Medium | Low (2 counters) | Good | General purpose |
//! | Token bucket | High | Low | Excellent | Bursty traffic |
//! | Leaking bucket | High | Low | None | Smooth output |
//! | GCRA | Highest | Low (1 timestamp) | Controlled | Precise rate control |

mod fixed_window;
mod gcra;
mod leaky_bucket;
mod sliding_window;
mod token_bucket;

pub use fixed_window::FixedWindow;
pub use gcra::GCRA;
pub use leaky_bucket::LeakyBucket;
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;
