//! Pipeline error types.

use thiserror::Error;

use papercast_store::StoreError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Validation failures raised by the segmentation engine.
///
/// Each variant names the offending segment index so the upstream
/// capability's response can be debugged from the job error alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentationError {
    #[error("segment list is empty")]
    EmptyPayload,

    #[error("payload is not valid segmentation JSON: {message}")]
    Malformed { message: String },

    #[error("segment {segment}: title is empty or whitespace")]
    BlankTitle { segment: usize },

    #[error("segment {segment}: page range has {len} elements, expected 2")]
    PageRangeShape { segment: usize, len: usize },

    #[error("segment {segment}: invalid page range [{start}, {end}] (need 1 <= start <= end)")]
    InvalidPageRange { segment: usize, start: i64, end: i64 },

    #[error("segment {segment}: negative prerequisite index {value}")]
    NegativePrerequisite { segment: usize, value: i64 },

    #[error("segment {segment}: prerequisite index {value} out of range (segment count {count})")]
    PrerequisiteOutOfRange {
        segment: usize,
        value: i64,
        count: usize,
    },

    #[error("segment {segment}: lists itself as a prerequisite")]
    SelfPrerequisite { segment: usize },
}

/// Errors that can occur while driving a job through the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] SegmentationError),

    #[error("External service error: {message}")]
    ExternalService { message: String, retryable: bool },

    #[error("Resource exhausted: {0}")]
    Resource(String),

    #[error("Call to {service} timed out after {timeout_ms}ms")]
    Timeout { service: String, timeout_ms: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Circuit breaker open for {service}")]
    CircuitOpen { service: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Upstream dependency failure, retryable by default.
    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalService {
            message: message.into(),
            retryable: true,
        }
    }

    /// Upstream failure explicitly marked non-retryable by the caller.
    pub fn external_permanent(message: impl Into<String>) -> Self {
        Self::ExternalService {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Check if error is retryable.
    ///
    /// Retryable when the error carries an explicit retryable marker, its
    /// variant is in the known-retryable set, or its message matches the
    /// transient-failure vocabulary. `CircuitOpen` is not retryable within
    /// a retry sequence; the breaker's cooldown gates the next attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            // Explicit marker wins, even over the message vocabulary.
            PipelineError::ExternalService { retryable, .. } => *retryable,
            PipelineError::Resource(_) | PipelineError::Timeout { .. } => true,
            PipelineError::Store(e) => {
                e.is_retryable() || papercast_models::is_transient_message(&e.to_string())
            }
            PipelineError::Validation(_)
            | PipelineError::NotFound(_)
            | PipelineError::CircuitOpen { .. }
            | PipelineError::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_variants() {
        assert!(PipelineError::external("503 from upstream").is_retryable());
        assert!(PipelineError::resource("worker pool exhausted").is_retryable());
        assert!(PipelineError::Timeout {
            service: "tts".to_string(),
            timeout_ms: 30_000,
        }
        .is_retryable());
    }

    #[test]
    fn test_non_retryable_variants() {
        assert!(!PipelineError::external_permanent("invalid API key").is_retryable());
        assert!(!PipelineError::not_found("jobs/abc").is_retryable());
        assert!(!PipelineError::CircuitOpen {
            service: "analyzer".to_string()
        }
        .is_retryable());
        assert!(
            !PipelineError::Validation(SegmentationError::BlankTitle { segment: 2 })
                .is_retryable()
        );
    }

    #[test]
    fn test_explicit_marker_overrides_vocabulary() {
        // An explicitly non-retryable error stays non-retryable even when
        // its message matches the transient vocabulary.
        let err = PipelineError::external_permanent("connection reset mid-stream");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_segmentation_error_names_segment() {
        let err = SegmentationError::PrerequisiteOutOfRange {
            segment: 3,
            value: 7,
            count: 4,
        };
        assert!(err.to_string().contains("segment 3"));
        assert!(err.to_string().contains('7'));
    }
}
