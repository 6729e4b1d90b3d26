//! Shared data models for the Papercast backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and per-stage progress
//! - Validated segments and their content references
//! - Raw (untrusted) segmentation payloads from the analysis capability
//! - Content records persisted across stages

pub mod content;
pub mod job;
pub mod raw;
pub mod segment;
pub mod utils;

// Re-export common types
pub use content::{ContentId, ContentPatch, ContentRecord};
pub use job::{Job, JobId, JobPatch, JobStatus, Stage, StageState, StageStatus, StageProgress};
pub use raw::{RawContentIndices, RawSegment, RawSegmentPayload};
pub use segment::{ContentRefs, Segment, SegmentId, SegmentedContent};
pub use utils::is_transient_message;
