//! Pipeline control core for Papercast.
//!
//! This crate provides:
//! - Stage orchestration with idempotent, monotonic progress
//! - Retry with exponential backoff and per-service circuit breakers
//! - The segmentation engine (validation + dependency ordering)
//! - Stage handlers wiring external capabilities through the above
//! - Configuration, structured logging, and metrics

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod invoker;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod segmentation;
pub mod stages;
pub mod throttle;

pub use circuit_breaker::{BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitState};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult, SegmentationError};
pub use invoker::ResilientInvoker;
pub use logging::init_tracing;
pub use orchestrator::{AdvanceOutcome, EventDispatcher, NoopDispatcher, StageOrchestrator};
pub use retry::{with_retry, RetryPolicy};
pub use stages::{ContentAnalyzer, PipelineRunner, ScriptWriter, SpeechSynthesizer};
pub use throttle::Throttle;
