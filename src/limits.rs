//! Request budgets for paid collaborators.
//!
//! Thin wrapper over the governor crate: a budget of N requests per rolling
//! window, acquired before every AI call. Acquisition suspends the calling
//! task until a slot frees without blocking other units of work.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A sliding budget of `max_requests` per `period`.
pub struct RateLimit {
    limiter: DirectLimiter,
}

impl RateLimit {
    /// Create a budget of `max_requests` per `period`.
    pub fn new(max_requests: u32, period: Duration) -> Self {
        let max = NonZeroU32::new(max_requests).unwrap_or(nonzero!(1u32));
        let cell = period
            .checked_div(max.get())
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_millis(1));
        let quota = Quota::with_period(cell)
            .expect("cell duration is non-zero")
            .allow_burst(max);
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Wait until a request slot is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to take a slot without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Declarative budget carried by config structs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuota {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window length.
    pub period: Duration,
}

impl RateQuota {
    /// A budget of `max_requests` per minute.
    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            period: Duration::from_secs(60),
        }
    }

    /// Build the runtime limiter for this budget.
    pub fn limiter(&self) -> RateLimit {
        RateLimit::new(self.max_requests, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_up_to_budget_is_immediate() {
        let limit = RateLimit::new(3, Duration::from_secs(60));
        assert!(limit.try_acquire());
        assert!(limit.try_acquire());
        assert!(limit.try_acquire());
        assert!(!limit.try_acquire());
    }

    #[tokio::test]
    async fn acquire_suspends_until_capacity() {
        let limit = RateLimit::new(2, Duration::from_millis(100));
        let start = std::time::Instant::now();
        limit.acquire().await;
        limit.acquire().await;
        limit.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
