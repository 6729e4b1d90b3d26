//! Validated segment output of the segmentation engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a segment, generated during segmentation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl SegmentId {
    /// Generate a new random segment ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolved references into the analyzed document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContentRefs {
    /// Inclusive 1-based page ranges
    pub page_ranges: Vec<(u32, u32)>,
    /// Referenced figure identifiers
    #[serde(default)]
    pub figure_ids: Vec<String>,
    /// Referenced table identifiers
    #[serde(default)]
    pub table_ids: Vec<String>,
    /// Referenced formula identifiers
    #[serde(default)]
    pub formula_ids: Vec<String>,
    /// Referenced citation identifiers
    #[serde(default)]
    pub citation_ids: Vec<String>,
}

/// A validated, dependency-ordered content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Generated segment ID
    pub id: SegmentId,

    /// Segment title from the analysis capability
    pub title: String,

    /// 1-based position consistent with the dependency ordering
    pub order: u32,

    /// Prerequisite segments, remapped from input indices to generated IDs
    #[serde(default)]
    pub prerequisites: Vec<SegmentId>,

    /// Content blocks this segment covers
    pub content_refs: ContentRefs,
}

/// The full output of the segmentation engine, sorted by `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentedContent {
    pub segments: Vec<Segment>,
}

impl SegmentedContent {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Look up a segment by its generated ID.
    pub fn get(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| &s.id == id)
    }
}
