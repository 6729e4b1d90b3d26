//! Circuit breaker for external service calls.
//!
//! Stops calling a failing dependency for a cooldown period after repeated
//! failures, then probes it with a limited number of trial calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::metrics::{record_breaker_rejection, record_breaker_transition};

/// Circuit breaker states.
///
/// Transitions only along closed -> open -> half-open -> {closed | open}.
#[derive(Clone, Debug, PartialEq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing fast until the reset timeout elapses
    Open { opened_at: Instant },
    /// Probing recovery with trial calls
    HalfOpen { success_count: u32 },
}

/// Circuit breaker parameters.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Cooldown before a trial call is permitted.
    pub reset_timeout: Duration,
    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u32,
    /// Hard timeout per wrapped call; exceeding it counts as a failure.
    pub call_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_millis(60_000),
            success_threshold: 2,
            call_timeout: Duration::from_millis(30_000),
        }
    }
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
}

/// Circuit breaker for one logical service.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CircuitBreaker {
    service: Arc<str>,
    inner: Arc<RwLock<BreakerInner>>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            service: Arc::from(service.into()),
            inner: Arc::new(RwLock::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
            })),
            config,
        }
    }

    /// Check if a call is admitted, moving Open -> HalfOpen once the reset
    /// timeout has elapsed. A rejected call must not reach the service.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.reset_timeout {
                    info!(service = %self.service, "Circuit breaker half-open, admitting trial call");
                    record_breaker_transition(&self.service, "half_open");
                    inner.state = CircuitState::HalfOpen { success_count: 0 };
                    true
                } else {
                    record_breaker_rejection(&self.service);
                    false
                }
            }
            CircuitState::HalfOpen { .. } => true,
        }
    }

    /// Record a successful call.
    pub fn success(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.consecutive_failures = 0;
        if let CircuitState::HalfOpen { success_count } = inner.state {
            let new_count = success_count + 1;
            if new_count >= self.config.success_threshold {
                info!(service = %self.service, "Circuit breaker closed after recovery");
                record_breaker_transition(&self.service, "closed");
                inner.state = CircuitState::Closed;
            } else {
                inner.state = CircuitState::HalfOpen {
                    success_count: new_count,
                };
            }
        }
    }

    /// Record a failed call.
    pub fn failure(&self) {
        let mut inner = self.inner.write().unwrap();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        service = %self.service,
                        failures = inner.consecutive_failures,
                        "Circuit breaker opened"
                    );
                    record_breaker_transition(&self.service, "open");
                    inner.state = CircuitState::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            // Any half-open failure reopens immediately with a fresh timer.
            CircuitState::HalfOpen { .. } => {
                warn!(service = %self.service, "Circuit breaker reopened from half-open");
                record_breaker_transition(&self.service, "open");
                inner.consecutive_failures = self.config.failure_threshold;
                inner.state = CircuitState::Open {
                    opened_at: Instant::now(),
                };
            }
            CircuitState::Open { .. } => {}
        }
    }

    /// Current state for monitoring.
    pub fn state(&self) -> CircuitState {
        self.inner.read().unwrap().state.clone()
    }

    /// Consecutive failure count for monitoring.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.read().unwrap().consecutive_failures
    }

    pub fn call_timeout(&self) -> Duration {
        self.config.call_timeout
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

/// Registry of circuit breakers keyed by logical service name.
///
/// Owned by the application root and injected wherever external calls are
/// made, so tests get isolated breaker state instead of a process global.
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
    default_config: BreakerConfig,
}

impl BreakerRegistry {
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            default_config,
        }
    }

    /// Fetch the breaker for a service, creating it on first use.
    ///
    /// `config` only applies when the breaker is created; an existing
    /// breaker keeps its original parameters.
    pub fn get_or_create(&self, service: &str, config: Option<&BreakerConfig>) -> CircuitBreaker {
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                CircuitBreaker::new(
                    service,
                    config.cloned().unwrap_or_else(|| self.default_config.clone()),
                )
            })
            .clone()
    }

    /// Snapshot of current breaker states for monitoring.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .lock()
            .unwrap()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(50),
            success_threshold: 2,
            call_timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new("svc", quick_config());

        breaker.failure();
        breaker.failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());

        breaker.failure();
        assert!(matches!(breaker.state(), CircuitState::Open { .. }));
        assert!(!breaker.allow());
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let breaker = CircuitBreaker::new("svc", quick_config());

        breaker.failure();
        breaker.failure();
        breaker.success();
        assert_eq!(breaker.consecutive_failures(), 0);

        breaker.failure();
        breaker.failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_after_reset_timeout() {
        let breaker = CircuitBreaker::new("svc", quick_config());
        for _ in 0..3 {
            breaker.failure();
        }
        assert!(!breaker.allow());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(breaker.allow());
        assert!(matches!(breaker.state(), CircuitState::HalfOpen { .. }));

        // Two consecutive successes close the circuit.
        breaker.success();
        assert!(matches!(breaker.state(), CircuitState::HalfOpen { .. }));
        breaker.success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("svc", quick_config());
        for _ in 0..3 {
            breaker.failure();
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(breaker.allow());

        breaker.failure();
        assert!(matches!(breaker.state(), CircuitState::Open { .. }));
        // Timer restarted, so the next call is rejected again.
        assert!(!breaker.allow());
    }

    #[test]
    fn test_registry_returns_shared_breaker() {
        let registry = BreakerRegistry::default();
        let a = registry.get_or_create("svc", None);
        let b = registry.get_or_create("svc", None);

        a.failure();
        assert_eq!(b.consecutive_failures(), 1);

        let other = registry.get_or_create("other", None);
        assert_eq!(other.consecutive_failures(), 0);
    }
}
