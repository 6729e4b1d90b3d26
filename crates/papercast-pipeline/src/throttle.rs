//! Minimum inter-call interval throttle.
//!
//! Rate-limited capabilities (the per-page analysis calls in particular)
//! must not be hit with unbounded parallelism. The throttle sits in front
//! of [`crate::invoker::ResilientInvoker`] and spaces calls at least
//! `min_interval` apart.

use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Spaces calls to one upstream capability by a minimum interval.
///
/// Cheap to clone; clones share the limiter.
#[derive(Clone)]
pub struct Throttle {
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl Throttle {
    /// Create a throttle with the given minimum interval between calls.
    /// A zero interval disables throttling.
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self { limiter }
    }

    /// Disabled throttle, calls pass through immediately.
    pub fn disabled() -> Self {
        Self { limiter: None }
    }

    /// Wait until the next call is permitted.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn test_spaces_calls_by_interval() {
        let throttle = Throttle::new(Duration::from_millis(20));
        let start = Instant::now();

        // First call is free; the next two wait one interval each.
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_disabled_throttle_is_immediate() {
        let throttle = Throttle::disabled();
        let start = Instant::now();
        for _ in 0..10 {
            throttle.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_zero_interval_disables() {
        let throttle = Throttle::new(Duration::ZERO);
        throttle.acquire().await;
    }
}
