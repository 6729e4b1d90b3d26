//! Resilient invocation of external capabilities.
//!
//! Composes retry around circuit-breaker admission: each retry attempt
//! independently re-checks breaker state, so a retry sequence short-circuits
//! as soon as the breaker opens mid-sequence. Every call is bounded by the
//! breaker's per-call timeout, and a timeout counts as a breaker failure.

use std::future::Future;
use std::sync::Arc;

use crate::circuit_breaker::{BreakerConfig, BreakerRegistry};
use crate::error::{PipelineError, PipelineResult};
use crate::retry::{with_retry, RetryPolicy};

/// Wraps external calls with retry and a per-service circuit breaker.
#[derive(Clone)]
pub struct ResilientInvoker {
    registry: Arc<BreakerRegistry>,
    retry: RetryPolicy,
}

impl ResilientInvoker {
    pub fn new(registry: Arc<BreakerRegistry>, retry: RetryPolicy) -> Self {
        Self { registry, retry }
    }

    /// The breaker registry this invoker draws from.
    pub fn registry(&self) -> &BreakerRegistry {
        &self.registry
    }

    /// Execute `operation` against `service` with the default policies.
    pub async fn execute<T, F, Fut>(&self, service: &str, operation: F) -> PipelineResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        self.execute_with(service, operation, None, None).await
    }

    /// Execute with per-call retry and breaker overrides.
    ///
    /// Breaker overrides only apply the first time a service's breaker is
    /// created; retry overrides apply to this call alone.
    pub async fn execute_with<T, F, Fut>(
        &self,
        service: &str,
        operation: F,
        retry: Option<RetryPolicy>,
        breaker: Option<BreakerConfig>,
    ) -> PipelineResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let policy = retry.unwrap_or_else(|| self.retry.clone());
        let breaker = self.registry.get_or_create(service, breaker.as_ref());

        with_retry(&policy, service, || {
            let breaker = breaker.clone();
            let operation = &operation;
            async move {
                if !breaker.allow() {
                    return Err(PipelineError::CircuitOpen {
                        service: breaker.service().to_string(),
                    });
                }

                match tokio::time::timeout(breaker.call_timeout(), operation()).await {
                    Ok(Ok(value)) => {
                        breaker.success();
                        Ok(value)
                    }
                    Ok(Err(e)) => {
                        breaker.failure();
                        Err(e)
                    }
                    Err(_) => {
                        breaker.failure();
                        Err(PipelineError::Timeout {
                            service: breaker.service().to_string(),
                            timeout_ms: breaker.call_timeout().as_millis() as u64,
                        })
                    }
                }
            }
        })
        .await
    }
}

impl Default for ResilientInvoker {
    fn default() -> Self {
        Self::new(Arc::new(BreakerRegistry::default()), RetryPolicy::default())
    }
}
