//! Pipeline metrics collection.
//!
//! Provides standardized metrics for monitoring the pipeline core:
//! - Retry counters by service
//! - Circuit breaker transition counters
//! - Stage completion/failure counters

use metrics::counter;

use papercast_models::Stage;

/// Metric name constants for consistency.
pub mod names {
    /// Total retry attempts by service.
    pub const RETRIES_TOTAL: &str = "pipeline_retries_total";

    /// Circuit breaker state transitions by service and target state.
    pub const BREAKER_TRANSITIONS_TOTAL: &str = "pipeline_breaker_transitions_total";

    /// Fail-fast rejections while a breaker is open, by service.
    pub const BREAKER_REJECTIONS_TOTAL: &str = "pipeline_breaker_rejections_total";

    /// Completed stages by stage name.
    pub const STAGES_COMPLETED_TOTAL: &str = "pipeline_stages_completed_total";

    /// Failed stages by stage name.
    pub const STAGES_FAILED_TOTAL: &str = "pipeline_stages_failed_total";

    /// Cyclic dependency graphs that fell back to input order.
    pub const SEGMENTATION_CYCLE_FALLBACKS_TOTAL: &str =
        "pipeline_segmentation_cycle_fallbacks_total";
}

/// Record a retry attempt against a service.
pub fn record_retry(service: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "service" => service.to_string()
    )
    .increment(1);
}

/// Record a circuit breaker state transition.
pub fn record_breaker_transition(service: &str, to_state: &'static str) {
    counter!(
        names::BREAKER_TRANSITIONS_TOTAL,
        "service" => service.to_string(),
        "to_state" => to_state
    )
    .increment(1);
}

/// Record a fail-fast rejection from an open breaker.
pub fn record_breaker_rejection(service: &str) {
    counter!(
        names::BREAKER_REJECTIONS_TOTAL,
        "service" => service.to_string()
    )
    .increment(1);
}

/// Record a completed stage.
pub fn record_stage_completed(stage: Stage) {
    counter!(
        names::STAGES_COMPLETED_TOTAL,
        "stage" => stage.as_str()
    )
    .increment(1);
}

/// Record a failed stage.
pub fn record_stage_failed(stage: Stage) {
    counter!(
        names::STAGES_FAILED_TOTAL,
        "stage" => stage.as_str()
    )
    .increment(1);
}

/// Record a cycle fallback in the segmentation engine.
pub fn record_cycle_fallback() {
    counter!(names::SEGMENTATION_CYCLE_FALLBACKS_TOTAL).increment(1);
}
