//! Retry with exponential backoff.
//!
//! Retries an async operation while its error stays retryable, sleeping
//! `min(initial_delay * multiplier^(attempt-1), max_delay)` between
//! attempts. Non-retryable errors abort on first occurrence; after the
//! attempt budget is exhausted the last error is returned unchanged.

use std::future::Future;
use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::error::PipelineResult;
use crate::metrics::record_retry;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Backoff multiplier applied per retry.
    pub backoff_multiplier: u32,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 2,
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before the retry that follows attempt `attempt` (1-based).
    fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Execute an async operation with retry.
///
/// `operation` is a factory invoked once per attempt. The error decides
/// whether another attempt is made; see
/// [`crate::error::PipelineError::is_retryable`].
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    service: &str,
    operation: F,
) -> PipelineResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = PipelineResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let span = info_span!("attempt", service = %service, attempt);

        match operation().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_after_attempt(attempt);

                warn!(
                    service = %service,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Call failed, retrying: {}",
                    e
                );

                record_retry(service);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!("retry loop returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::{PipelineError, SegmentationError};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default().with_initial_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after_attempt(3), Duration::from_millis(4000));
        // Capped at max_delay.
        assert_eq!(policy.delay_after_attempt(6), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn test_immediate_success_single_call() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), "svc", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, PipelineError>(42) }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_two_timeouts_then_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), "svc", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(PipelineError::Timeout {
                        service: "svc".to_string(),
                        timeout_ms: 30_000,
                    })
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast_policy(), "svc", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(PipelineError::external("503 from upstream")) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, PipelineError::ExternalService { .. }));
    }

    #[tokio::test]
    async fn test_non_retryable_aborts_first_call() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast_policy(), "svc", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(PipelineError::Validation(SegmentationError::BlankTitle {
                    segment: 0,
                }))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_explicitly_non_retryable_marker() {
        let calls = AtomicU32::new(0);
        let _ = with_retry(&fast_policy(), "svc", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(PipelineError::external_permanent("bad request")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
