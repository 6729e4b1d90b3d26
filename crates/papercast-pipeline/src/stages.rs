//! Stage handlers: wiring capabilities through the control core.
//!
//! Each handler is a stateless unit of work triggered at least once per
//! stage. All external calls go through [`ResilientInvoker`]; the per-page
//! analysis calls additionally pass the [`Throttle`] to respect upstream
//! capacity limits.

use std::future::Future;

use papercast_models::{ContentId, ContentPatch, Job, JobId, Segment, SegmentId, Stage};
use papercast_store::{ContentStore, JobStore};

use crate::error::{PipelineError, PipelineResult};
use crate::invoker::ResilientInvoker;
use crate::orchestrator::{AdvanceOutcome, EventDispatcher, StageOrchestrator};
use crate::segmentation;
use crate::throttle::Throttle;

/// Logical service names used to key circuit breakers.
pub const SERVICE_ANALYZER: &str = "content-analyzer";
pub const SERVICE_SCRIPT_WRITER: &str = "script-writer";
pub const SERVICE_SPEECH: &str = "speech-synthesizer";

/// Content-understanding capability.
pub trait ContentAnalyzer: Send + Sync {
    /// Analyze one page of the document.
    fn analyze_page(
        &self,
        content_id: &ContentId,
        page: u32,
    ) -> impl Future<Output = PipelineResult<serde_json::Value>> + Send;

    /// Propose a segment structure over the per-page analyses. The result
    /// is untrusted and goes through the segmentation engine.
    fn propose_segments(
        &self,
        content_id: &ContentId,
        pages: &[serde_json::Value],
    ) -> impl Future<Output = PipelineResult<serde_json::Value>> + Send;
}

/// Text-generation capability: narration script for one segment.
pub trait ScriptWriter: Send + Sync {
    fn write_script(
        &self,
        segment: &Segment,
    ) -> impl Future<Output = PipelineResult<String>> + Send;
}

/// Speech-synthesis capability: audio for one script. Returns an opaque
/// storage reference.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(
        &self,
        segment_id: &SegmentId,
        script: &str,
    ) -> impl Future<Output = PipelineResult<String>> + Send;
}

/// Composes the orchestrator, invoker, stores, and capabilities into the
/// four stage handlers.
pub struct PipelineRunner<S, C, D, A, W, V> {
    orchestrator: StageOrchestrator<S, D>,
    content: C,
    invoker: ResilientInvoker,
    throttle: Throttle,
    analyzer: A,
    writer: W,
    synthesizer: V,
}

impl<S, C, D, A, W, V> PipelineRunner<S, C, D, A, W, V>
where
    S: JobStore,
    C: ContentStore,
    D: EventDispatcher,
    A: ContentAnalyzer,
    W: ScriptWriter,
    V: SpeechSynthesizer,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orchestrator: StageOrchestrator<S, D>,
        content: C,
        invoker: ResilientInvoker,
        throttle: Throttle,
        analyzer: A,
        writer: W,
        synthesizer: V,
    ) -> Self {
        Self {
            orchestrator,
            content,
            invoker,
            throttle,
            analyzer,
            writer,
            synthesizer,
        }
    }

    pub fn orchestrator(&self) -> &StageOrchestrator<S, D> {
        &self.orchestrator
    }

    /// Upload entry point: create the content record and its job, then
    /// trigger the analysis stage.
    pub async fn submit(&self) -> PipelineResult<Job> {
        let content_id = ContentId::new();
        self.content.create_content(&content_id).await?;
        let job = self
            .orchestrator
            .store()
            .create_job(Job::new(content_id))
            .await?;

        self.orchestrator
            .dispatcher()
            .trigger(Stage::Analysis, &job.id)
            .await;
        Ok(job)
    }

    /// Analysis stage: one throttled capability call per page, then a
    /// segment proposal over the collected page analyses. The raw proposal
    /// is persisted for the segmentation stage.
    pub async fn run_analysis(
        &self,
        job_id: &JobId,
        page_count: u32,
    ) -> PipelineResult<AdvanceOutcome<()>> {
        let job = self.orchestrator.load_job(job_id).await?;
        let content_id = job.content_id.clone();

        self.orchestrator
            .advance(job_id, Stage::Analysis, || async {
                let mut pages = Vec::with_capacity(page_count as usize);
                for page in 1..=page_count {
                    self.throttle.acquire().await;
                    let analysis = self
                        .invoker
                        .execute(SERVICE_ANALYZER, || {
                            self.analyzer.analyze_page(&content_id, page)
                        })
                        .await?;
                    pages.push(analysis);
                }

                let raw = self
                    .invoker
                    .execute(SERVICE_ANALYZER, || {
                        self.analyzer.propose_segments(&content_id, &pages)
                    })
                    .await?;

                self.content
                    .update_content(&content_id, ContentPatch::new().with_raw_analysis(raw))
                    .await?;
                Ok(())
            })
            .await
    }

    /// Segmentation stage: validate and order the stored raw proposal.
    /// Pure computation, no external call.
    pub async fn run_segmentation(&self, job_id: &JobId) -> PipelineResult<AdvanceOutcome<()>> {
        let job = self.orchestrator.load_job(job_id).await?;
        let content_id = job.content_id.clone();

        self.orchestrator
            .advance(job_id, Stage::Segmentation, || async {
                let record = self.load_content(&content_id).await?;
                let raw = record.raw_analysis.ok_or_else(|| {
                    PipelineError::not_found(format!("content/{}/raw_analysis", content_id))
                })?;

                let payload = segmentation::parse(&raw)?;
                let segmented = segmentation::process(&payload)?;

                self.content
                    .update_content(
                        &content_id,
                        ContentPatch::new().with_segments(segmented.segments),
                    )
                    .await?;
                Ok(())
            })
            .await
    }

    /// Script-generation stage: one capability call per segment, in
    /// dependency order.
    pub async fn run_script_generation(
        &self,
        job_id: &JobId,
    ) -> PipelineResult<AdvanceOutcome<()>> {
        let job = self.orchestrator.load_job(job_id).await?;
        let content_id = job.content_id.clone();

        self.orchestrator
            .advance(job_id, Stage::ScriptGeneration, || async {
                let record = self.load_content(&content_id).await?;
                if record.segments.is_empty() {
                    return Err(PipelineError::not_found(format!(
                        "content/{}/segments",
                        content_id
                    )));
                }

                let mut patch = ContentPatch::new();
                for segment in &record.segments {
                    let script = self
                        .invoker
                        .execute(SERVICE_SCRIPT_WRITER, || self.writer.write_script(segment))
                        .await?;
                    patch = patch.with_script(segment.id.clone(), script);
                }

                self.content.update_content(&content_id, patch).await?;
                Ok(())
            })
            .await
    }

    /// Audio-synthesis stage: one capability call per segment script.
    pub async fn run_audio_synthesis(
        &self,
        job_id: &JobId,
    ) -> PipelineResult<AdvanceOutcome<()>> {
        let job = self.orchestrator.load_job(job_id).await?;
        let content_id = job.content_id.clone();

        self.orchestrator
            .advance(job_id, Stage::AudioSynthesis, || async {
                let record = self.load_content(&content_id).await?;

                let mut patch = ContentPatch::new();
                for segment in &record.segments {
                    let script = record.scripts.get(&segment.id).ok_or_else(|| {
                        PipelineError::not_found(format!(
                            "content/{}/scripts/{}",
                            content_id, segment.id
                        ))
                    })?;
                    let audio_ref = self
                        .invoker
                        .execute(SERVICE_SPEECH, || {
                            self.synthesizer.synthesize(&segment.id, script)
                        })
                        .await?;
                    patch = patch.with_audio_ref(segment.id.clone(), audio_ref);
                }

                self.content.update_content(&content_id, patch).await?;
                Ok(())
            })
            .await
    }

    async fn load_content(
        &self,
        content_id: &ContentId,
    ) -> PipelineResult<papercast_models::ContentRecord> {
        self.content
            .get_content(content_id)
            .await?
            .ok_or_else(|| PipelineError::not_found(format!("content/{}", content_id)))
    }
}
