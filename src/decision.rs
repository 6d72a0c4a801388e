//! Decision and state value objects returned by rate limiters.

use std::time::Duration;

/// Immutable result of one `limit()` call.
///
/// Invariants: `0 <= remaining <= limit`; `limited` iff `retry_after > Duration::ZERO`;
/// `reset_after >= Duration::ZERO`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// True if the request was rejected.
    pub limited: bool,
    /// Capacity reported to the caller (`burst` for bucket algorithms, `Quota::limit`
    /// for window algorithms).
    pub limit: u64,
    /// Admissible units left before the next refill/rollover.
    pub remaining: u64,
    /// Time until `remaining` is fully restored.
    pub reset_after: Duration,
    /// Minimum wait before `cost` units would succeed. Zero iff not limited.
    pub retry_after: Duration,
}

impl Decision {
    /// Build an admitted decision. `retry_after` is always zero.
    pub fn allowed(limit: u64, remaining: u64, reset_after: Duration) -> Self {
        Self {
            limited: false,
            limit,
            remaining,
            reset_after,
            retry_after: Duration::ZERO,
        }
    }

    /// Build a denied decision.
    pub fn denied(limit: u64, remaining: u64, reset_after: Duration, retry_after: Duration) -> Self {
        Self {
            limited: true,
            limit,
            remaining,
            reset_after,
            retry_after,
        }
    }

    /// True if the request was admitted.
    pub fn is_allowed(&self) -> bool {
        !self.limited
    }

    /// True if the request was rejected.
    pub fn is_denied(&self) -> bool {
        self.limited
    }
}

/// Non-mutating observation of a key's current state, as returned by `peek()`.
/// Carries the same numeric quantities a `limit(key, cost=0)` call would.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitState {
    /// Capacity reported to the caller.
    pub limit: u64,
    /// Admissible units left before the next refill/rollover.
    pub remaining: u64,
    /// Time until `remaining` is fully restored.
    pub reset_after: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_has_zero_retry_after() {
        let d = Decision::allowed(10, 5, Duration::from_secs(1));
        assert!(d.is_allowed());
        assert_eq!(d.retry_after, Duration::ZERO);
    }

    #[test]
    fn denied_implies_positive_retry_after() {
        let d = Decision::denied(10, 0, Duration::from_secs(1), Duration::from_millis(250));
        assert!(d.is_denied());
        assert!(d.retry_after > Duration::ZERO);
    }
}
