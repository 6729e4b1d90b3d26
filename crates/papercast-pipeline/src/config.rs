//! Pipeline configuration.

use std::time::Duration;

use crate::circuit_breaker::BreakerConfig;
use crate::retry::RetryPolicy;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Attempt budget per external call, including the first attempt
    pub retry_max_attempts: u32,
    /// Delay before the first retry
    pub retry_initial_delay: Duration,
    /// Backoff multiplier per retry
    pub retry_backoff_multiplier: u32,
    /// Cap on the delay between retries
    pub retry_max_delay: Duration,
    /// Consecutive failures before a breaker opens
    pub breaker_failure_threshold: u32,
    /// Breaker cooldown before a trial call
    pub breaker_reset_timeout: Duration,
    /// Consecutive half-open successes before a breaker closes
    pub breaker_success_threshold: u32,
    /// Hard timeout per external call
    pub call_timeout: Duration,
    /// Minimum interval between per-page analysis calls
    pub min_call_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry_max_attempts: 3,
            retry_initial_delay: Duration::from_millis(1000),
            retry_backoff_multiplier: 2,
            retry_max_delay: Duration::from_millis(10_000),
            breaker_failure_threshold: 5,
            breaker_reset_timeout: Duration::from_millis(60_000),
            breaker_success_threshold: 2,
            call_timeout: Duration::from_millis(30_000),
            min_call_interval: Duration::from_millis(500),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            retry_max_attempts: env_u32("PIPELINE_RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts),
            retry_initial_delay: env_ms("PIPELINE_RETRY_INITIAL_MS", defaults.retry_initial_delay),
            retry_backoff_multiplier: env_u32(
                "PIPELINE_RETRY_MULTIPLIER",
                defaults.retry_backoff_multiplier,
            ),
            retry_max_delay: env_ms("PIPELINE_RETRY_MAX_MS", defaults.retry_max_delay),
            breaker_failure_threshold: env_u32(
                "PIPELINE_BREAKER_FAILURES",
                defaults.breaker_failure_threshold,
            ),
            breaker_reset_timeout: env_ms(
                "PIPELINE_BREAKER_RESET_MS",
                defaults.breaker_reset_timeout,
            ),
            breaker_success_threshold: env_u32(
                "PIPELINE_BREAKER_SUCCESSES",
                defaults.breaker_success_threshold,
            ),
            call_timeout: env_ms("PIPELINE_CALL_TIMEOUT_MS", defaults.call_timeout),
            min_call_interval: env_ms("PIPELINE_MIN_CALL_INTERVAL_MS", defaults.min_call_interval),
        }
    }

    /// Retry policy derived from this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            initial_delay: self.retry_initial_delay,
            backoff_multiplier: self.retry_backoff_multiplier,
            max_delay: self.retry_max_delay,
        }
    }

    /// Default breaker parameters derived from this config.
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            reset_timeout: self.breaker_reset_timeout,
            success_threshold: self.breaker_success_threshold,
            call_timeout: self.call_timeout,
        }
    }
}

fn env_u32(var: &str, default: u32) -> u32 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_ms(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
