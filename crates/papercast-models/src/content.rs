//! Content records persisted across pipeline stages.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::segment::{Segment, SegmentId};

/// Unique identifier for a content record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the pipeline accumulates for one document.
///
/// Each stage appends its output: analysis stores the raw capability
/// response, segmentation the validated segments, script generation the
/// per-segment scripts, audio synthesis the per-segment audio references.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentRecord {
    /// Content ID (matches the owning job's document)
    pub id: ContentId,

    /// Raw analysis response, kept for segmentation and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_analysis: Option<serde_json::Value>,

    /// Validated, dependency-ordered segments
    #[serde(default)]
    pub segments: Vec<Segment>,

    /// Generated narration script per segment
    #[serde(default)]
    pub scripts: HashMap<SegmentId, String>,

    /// Synthesized audio reference per segment (opaque storage key)
    #[serde(default)]
    pub audio_refs: HashMap<SegmentId, String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Create an empty record for a new document.
    pub fn new(id: ContentId) -> Self {
        let now = Utc::now();
        Self {
            id,
            raw_analysis: None,
            segments: Vec::new(),
            scripts: HashMap::new(),
            audio_refs: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial, merge-only update to a content record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPatch {
    /// Raw analysis response to record
    pub raw_analysis: Option<serde_json::Value>,
    /// Segments to replace (a stage writes its full output at once)
    pub segments: Option<Vec<Segment>>,
    /// Scripts to merge in
    pub scripts: Vec<(SegmentId, String)>,
    /// Audio references to merge in
    pub audio_refs: Vec<(SegmentId, String)>,
}

impl ContentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw_analysis(mut self, raw: serde_json::Value) -> Self {
        self.raw_analysis = Some(raw);
        self
    }

    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = Some(segments);
        self
    }

    pub fn with_script(mut self, segment: SegmentId, script: impl Into<String>) -> Self {
        self.scripts.push((segment, script.into()));
        self
    }

    pub fn with_audio_ref(mut self, segment: SegmentId, audio_ref: impl Into<String>) -> Self {
        self.audio_refs.push((segment, audio_ref.into()));
        self
    }

    /// Apply this patch in place, bumping `updated_at`.
    pub fn apply(self, record: &mut ContentRecord) {
        if let Some(raw) = self.raw_analysis {
            record.raw_analysis = Some(raw);
        }
        if let Some(segments) = self.segments {
            record.segments = segments;
        }
        for (id, script) in self.scripts {
            record.scripts.insert(id, script);
        }
        for (id, audio_ref) in self.audio_refs {
            record.audio_refs.insert(id, audio_ref);
        }
        record.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_merges_scripts() {
        let mut record = ContentRecord::new(ContentId::new());
        let a = SegmentId::new();
        let b = SegmentId::new();

        ContentPatch::new()
            .with_script(a.clone(), "Script A")
            .apply(&mut record);
        ContentPatch::new()
            .with_script(b.clone(), "Script B")
            .apply(&mut record);

        assert_eq!(record.scripts.len(), 2);
        assert_eq!(record.scripts[&a], "Script A");
        assert_eq!(record.scripts[&b], "Script B");
    }

    #[test]
    fn test_patch_replaces_raw_analysis() {
        let mut record = ContentRecord::new(ContentId::new());
        ContentPatch::new()
            .with_raw_analysis(serde_json::json!({"pages": 12}))
            .apply(&mut record);

        assert_eq!(record.raw_analysis.unwrap()["pages"], 12);
    }
}
