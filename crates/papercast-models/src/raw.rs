//! Untrusted segmentation payload as returned by the analysis capability.
//!
//! These types deserialize the capability's JSON as loosely as the wire
//! format allows; semantic checks (bounds, ranges, self-references) belong
//! to the segmentation engine, which turns a [`RawSegmentPayload`] into a
//! validated `SegmentedContent` or a typed validation failure.

use serde::{Deserialize, Serialize};

/// Top-level raw payload: the segment list proposed by the capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSegmentPayload {
    pub segments: Vec<RawSegment>,
}

/// One proposed segment, untrusted.
///
/// `prerequisites` are indices into the same payload. They are kept as
/// `i64` so negative values survive parsing and are rejected by validation
/// with an error naming the segment, instead of a serde type error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSegment {
    pub title: String,

    pub content_indices: RawContentIndices,

    #[serde(default)]
    pub prerequisites: Vec<i64>,
}

/// Untrusted content references. Absent id arrays default to empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContentIndices {
    /// Page ranges as loose integer lists; validation enforces the
    /// 2-element `[start, end]` shape and `1 <= start <= end`.
    #[serde(default)]
    pub page_ranges: Vec<Vec<i64>>,

    #[serde(default)]
    pub figure_ids: Vec<String>,

    #[serde(default)]
    pub table_ids: Vec<String>,

    #[serde(default)]
    pub formula_ids: Vec<String>,

    #[serde(default)]
    pub citation_ids: Vec<String>,
}
