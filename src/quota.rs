//! Quota configuration for rate limiting.
//!
//! A `Quota` defines the rate limiting parameters: how many requests are allowed
//! over what time period, and optionally how much burst capacity is available.
//!
//! # Examples
//!
//! ```ignore
//! use throttled::Quota;
//! use std::time::Duration;
//!
//! // 100 requests per minute
//! let quota = Quota::per_minute(100);
//!
//! // 100 requests per minute with burst of 150
//! let quota = Quota::per_minute(100).with_burst(150);
//!
//! // GCRA-style: one request per 100ms
//! let quota = Quota::simple(Duration::from_millis(100));
//!
//! // Custom: 50 requests per 30 seconds
//! let quota = Quota::new(50, Duration::from_secs(30));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SetUpError};

/// Rate limiting quota configuration.
///
/// A quota defines the maximum number of requests allowed within a time window
/// (`period`, `limit`), along with optional burst capacity for handling traffic
/// spikes. `burst` always defaults to `limit` and is clamped to be at least `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    /// Steady-state count admitted per period.
    limit: u64,

    /// Time period the limit applies to.
    period: Duration,

    /// Maximum instantaneous draw (defaults to `limit` if not set).
    burst: Option<u64>,
}

impl Quota {
    /// Create a new quota with the given limit and period.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0 or `period` is zero duration. Use [`Quota::try_new`]
    /// to get a `Result` instead.
    pub fn new(limit: u64, period: Duration) -> Self {
        assert!(limit > 0, "limit must be greater than 0");
        assert!(!period.is_zero(), "period must be non-zero");

        Self {
            limit,
            period,
            burst: None,
        }
    }

    /// Create a quota allowing `n` requests per second.
    pub fn per_second(n: u64) -> Self {
        Self::new(n, Duration::from_secs(1))
    }

    /// Create a quota allowing `n` requests per minute.
    pub fn per_minute(n: u64) -> Self {
        Self::new(n, Duration::from_secs(60))
    }

    /// Create a quota allowing `n` requests per hour.
    pub fn per_hour(n: u64) -> Self {
        Self::new(n, Duration::from_secs(3600))
    }

    /// Create a quota allowing `n` requests per day.
    pub fn per_day(n: u64) -> Self {
        Self::new(n, Duration::from_secs(86400))
    }

    /// Create a GCRA-style simple quota with a fixed period between requests.
    ///
    /// Equivalent to 1 request per `period`.
    pub fn simple(period: Duration) -> Self {
        Self::new(1, period)
    }

    /// Create a GCRA-style quota with burst allowance.
    pub fn with_period_and_burst(period: Duration, burst: u64) -> Self {
        Self::new(1, period).with_burst(burst)
    }

    /// Try to create a new quota, returning `SetUpError` if invalid.
    pub fn try_new(limit: u64, period: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(SetUpError::InvalidQuota("limit must be greater than 0".into()).into());
        }
        if period.is_zero() {
            return Err(SetUpError::InvalidQuota("period must be non-zero".into()).into());
        }
        Ok(Self {
            limit,
            period,
            burst: None,
        })
    }

    /// Set the burst size (maximum requests that can be made instantly).
    ///
    /// Burst is clamped to be at least `limit`.
    pub fn with_burst(mut self, burst: u64) -> Self {
        self.burst = Some(burst.max(self.limit));
        self
    }

    /// The steady-state count admitted per period.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// The time period the limit applies to.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The effective burst size: the configured burst, or `limit` if unset.
    pub fn burst(&self) -> u64 {
        self.burst.unwrap_or(self.limit)
    }

    /// Derived rate in admitted units per second.
    pub fn rate(&self) -> f64 {
        self.limit as f64 / self.period.as_secs_f64()
    }

    /// Derived emission interval: seconds per admitted unit (`period / limit`).
    pub fn emission_interval(&self) -> Duration {
        Duration::from_secs_f64(self.period.as_secs_f64() / self.limit as f64)
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Builder for creating quotas with validation.
#[derive(Debug, Default)]
pub struct QuotaBuilder {
    limit: Option<u64>,
    period: Option<Duration>,
    burst: Option<u64>,
}

impl QuotaBuilder {
    /// Create a new quota builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the steady-state limit per period.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set the period duration.
    pub fn period(mut self, duration: Duration) -> Self {
        self.period = Some(duration);
        self
    }

    /// Set the burst size.
    pub fn burst(mut self, n: u64) -> Self {
        self.burst = Some(n);
        self
    }

    /// Build the quota, returning `SetUpError` if required fields are missing or invalid.
    pub fn build(self) -> Result<Quota> {
        let limit = self
            .limit
            .ok_or_else(|| SetUpError::Other("quota builder: missing limit".into()))?;
        let period = self
            .period
            .ok_or_else(|| SetUpError::Other("quota builder: missing period".into()))?;

        let mut quota = Quota::try_new(limit, period)?;
        if let Some(burst) = self.burst {
            quota = quota.with_burst(burst);
        }
        Ok(quota)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_second_defaults() {
        let quota = Quota::per_second(10);
        assert_eq!(quota.limit(), 10);
        assert_eq!(quota.period(), Duration::from_secs(1));
        assert_eq!(quota.burst(), 10);
        assert!((quota.rate() - 10.0).abs() < 0.001);
    }

    #[test]
    fn per_minute_defaults() {
        let quota = Quota::per_minute(60);
        assert_eq!(quota.limit(), 60);
        assert_eq!(quota.period(), Duration::from_secs(60));
        assert!((quota.rate() - 1.0).abs() < 0.001);
    }

    #[test]
    fn with_burst_overrides() {
        let quota = Quota::per_minute(60).with_burst(100);
        assert_eq!(quota.limit(), 60);
        assert_eq!(quota.burst(), 100);
    }

    #[test]
    fn burst_clamped_to_limit() {
        let quota = Quota::per_minute(60).with_burst(30);
        assert_eq!(quota.burst(), 60);
    }

    #[test]
    fn simple_is_one_per_period() {
        let quota = Quota::simple(Duration::from_millis(100));
        assert_eq!(quota.limit(), 1);
        assert_eq!(quota.period(), Duration::from_millis(100));
        assert_eq!(quota.emission_interval(), Duration::from_millis(100));
    }

    #[test]
    fn emission_interval_is_period_over_limit() {
        let quota = Quota::per_second(10);
        assert_eq!(quota.emission_interval(), Duration::from_millis(100));
    }

    #[test]
    fn builder_happy_path() {
        let quota = QuotaBuilder::new()
            .limit(100)
            .period(Duration::from_secs(60))
            .burst(150)
            .build()
            .unwrap();

        assert_eq!(quota.limit(), 100);
        assert_eq!(quota.period(), Duration::from_secs(60));
        assert_eq!(quota.burst(), 150);
    }

    #[test]
    fn builder_missing_fields_errors() {
        assert!(QuotaBuilder::new().limit(100).build().is_err());
        assert!(QuotaBuilder::new().period(Duration::from_secs(60)).build().is_err());
    }

    #[test]
    #[should_panic]
    fn zero_limit_panics() {
        Quota::new(0, Duration::from_secs(60));
    }

    #[test]
    #[should_panic]
    fn zero_period_panics() {
        Quota::new(100, Duration::ZERO);
    }
}
