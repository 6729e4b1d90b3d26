//! Job definitions for pipeline processing.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use uuid::Uuid;

use crate::content::ContentId;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overall job status, reflecting the furthest stage reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job created, no stage started yet
    #[default]
    Queued,
    /// Content analysis in progress
    Analyzing,
    /// Segmentation in progress
    Segmenting,
    /// Script generation in progress
    GeneratingScript,
    /// Audio synthesis in progress
    SynthesizingAudio,
    /// All stages completed successfully
    Completed,
    /// Job failed at some stage (terminal)
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Segmenting => "segmenting",
            JobStatus::GeneratingScript => "generating_script",
            JobStatus::SynthesizingAudio => "synthesizing_audio",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more transitions expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named step in the job pipeline.
///
/// Stages run strictly in declaration order; `next()` yields the successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analysis,
    Segmentation,
    ScriptGeneration,
    AudioSynthesis,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 4] = [
        Stage::Analysis,
        Stage::Segmentation,
        Stage::ScriptGeneration,
        Stage::AudioSynthesis,
    ];

    /// Number of pipeline stages.
    pub const COUNT: usize = Self::ALL.len();

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analysis => "analysis",
            Stage::Segmentation => "segmentation",
            Stage::ScriptGeneration => "script_generation",
            Stage::AudioSynthesis => "audio_synthesis",
        }
    }

    /// Position of this stage in the pipeline (0-based).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<Stage> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Job status while this stage is running.
    pub fn running_status(&self) -> JobStatus {
        match self {
            Stage::Analysis => JobStatus::Analyzing,
            Stage::Segmentation => JobStatus::Segmenting,
            Stage::ScriptGeneration => JobStatus::GeneratingScript,
            Stage::AudioSynthesis => JobStatus::SynthesizingAudio,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution state of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::InProgress => "in_progress",
            StageState::Completed => "completed",
            StageState::Failed => "failed",
        }
    }
}

/// Progress record for a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct StageStatus {
    /// Current execution state
    pub state: StageState,

    /// When the stage started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the stage completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageStatus {
    /// Mark the stage as started now.
    pub fn start(&mut self) {
        self.state = StageState::InProgress;
        self.started_at = Some(Utc::now());
    }

    /// Mark the stage as completed now. Keeps `started_at`.
    pub fn complete(&mut self) {
        self.state = StageState::Completed;
        self.completed_at = Some(Utc::now());
        self.error = None;
    }

    /// Mark the stage as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = StageState::Failed;
        self.error = Some(error.into());
    }

    pub fn is_completed(&self) -> bool {
        self.state == StageState::Completed
    }
}

/// Fixed-size stage progress, indexed by [`Stage`].
///
/// Stage identifiers are checked at compile time; there is no string-tagged
/// lookup, and a merge can never drop another stage's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct StageProgress {
    stages: [StageStatus; Stage::COUNT],
}

impl StageProgress {
    /// All stages pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record for one stage, leaving the others untouched.
    pub fn set(&mut self, stage: Stage, status: StageStatus) {
        self.stages[stage.index()] = status;
    }

    /// Iterate stages in pipeline order with their progress records.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, &StageStatus)> {
        Stage::ALL.iter().map(move |s| (*s, &self.stages[s.index()]))
    }

    /// The last stage that has completed, if any.
    pub fn furthest_completed(&self) -> Option<Stage> {
        Stage::ALL
            .iter()
            .rev()
            .find(|s| self.stages[s.index()].is_completed())
            .copied()
    }

    /// True if every stage before `stage` has completed.
    pub fn predecessors_completed(&self, stage: Stage) -> bool {
        Stage::ALL[..stage.index()]
            .iter()
            .all(|s| self.stages[s.index()].is_completed())
    }
}

impl Index<Stage> for StageProgress {
    type Output = StageStatus;

    fn index(&self, stage: Stage) -> &StageStatus {
        &self.stages[stage.index()]
    }
}

impl IndexMut<Stage> for StageProgress {
    fn index_mut(&mut self, stage: Stage) -> &mut StageStatus {
        &mut self.stages[stage.index()]
    }
}

/// A job being driven through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Content record this job operates on
    pub content_id: ContentId,

    /// Overall status (furthest stage reached)
    #[serde(default)]
    pub status: JobStatus,

    /// Per-stage progress
    #[serde(default)]
    pub stages: StageProgress,

    /// Associated conversational agent, if one was provisioned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_ref: Option<String>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued job for a content record.
    pub fn new(content_id: ContentId) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            content_id,
            status: JobStatus::Queued,
            stages: StageProgress::new(),
            agent_ref: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a job with a caller-supplied ID (e.g. from the upload step).
    pub fn with_id(id: JobId, content_id: ContentId) -> Self {
        Self { id, ..Self::new(content_id) }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Human-readable failure surface: the recorded error message plus
    /// whether re-triggering the failed stage may succeed.
    pub fn failure(&self) -> Option<(&str, bool)> {
        if self.status != JobStatus::Failed {
            return None;
        }
        let message = self.error.as_deref().unwrap_or("unknown error");
        let retryable = crate::is_transient_message(message);
        Some((message, retryable))
    }
}

/// Partial, merge-only update to a job.
///
/// Stage updates replace only the named stage's record; prior stage history
/// is never dropped by applying a patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPatch {
    /// New overall status, if changing
    pub status: Option<JobStatus>,
    /// Error message to record, if any
    pub error: Option<String>,
    /// Agent reference to record, if any
    pub agent_ref: Option<String>,
    /// Per-stage replacements
    pub stages: Vec<(Stage, StageStatus)>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_agent_ref(mut self, agent_ref: impl Into<String>) -> Self {
        self.agent_ref = Some(agent_ref.into());
        self
    }

    pub fn with_stage(mut self, stage: Stage, status: StageStatus) -> Self {
        self.stages.push((stage, status));
        self
    }

    /// Apply this patch to a job in place, bumping `updated_at`.
    pub fn apply(self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(error) = self.error {
            job.error = Some(error);
        }
        if let Some(agent_ref) = self.agent_ref {
            job.agent_ref = Some(agent_ref);
        }
        for (stage, status) in self.stages {
            job.stages.set(stage, status);
        }
        job.updated_at = Utc::now();
    }
}
