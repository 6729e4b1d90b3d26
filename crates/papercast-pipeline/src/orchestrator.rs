//! Stage orchestration.
//!
//! Drives a job through its ordered stages with monotonic, idempotent
//! progress. Triggers arrive at least once; a duplicate trigger for a
//! completed stage is a no-op, and a terminal job is never mutated again.

use std::future::Future;

use tracing::{error, info};

use papercast_models::{Job, JobId, JobPatch, JobStatus, Stage};
use papercast_store::JobStore;

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::{record_stage_completed, record_stage_failed};

/// At-least-once trigger mechanism for the next stage.
///
/// Fire-and-forget: the orchestrator ignores delivery outcome, and no
/// cross-job ordering is guaranteed.
pub trait EventDispatcher: Send + Sync {
    fn trigger(&self, stage: Stage, job_id: &JobId) -> impl Future<Output = ()> + Send;
}

/// Dispatcher that drops triggers, for callers that drive stages directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

impl EventDispatcher for NoopDispatcher {
    async fn trigger(&self, _stage: Stage, _job_id: &JobId) {}
}

/// Outcome of an [`StageOrchestrator::advance`] call.
#[derive(Debug, PartialEq)]
pub enum AdvanceOutcome<T> {
    /// The stage ran and completed; carries the stage's output.
    Completed(T),
    /// The stage had already completed; duplicate trigger, work not run.
    AlreadyCompleted,
    /// The job is already `completed` or `failed`; nothing was done.
    AlreadyTerminal,
    /// An earlier stage has not completed yet; work not run.
    NotReady,
}

impl<T> AdvanceOutcome<T> {
    /// Returns the stage output if the stage ran.
    pub fn into_output(self) -> Option<T> {
        match self {
            AdvanceOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn did_run(&self) -> bool {
        matches!(self, AdvanceOutcome::Completed(_))
    }
}

/// Sequences a job through its pipeline stages.
#[derive(Clone)]
pub struct StageOrchestrator<S, D = NoopDispatcher> {
    store: S,
    dispatcher: D,
}

impl<S: JobStore> StageOrchestrator<S, NoopDispatcher> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            dispatcher: NoopDispatcher,
        }
    }
}

impl<S: JobStore, D: EventDispatcher> StageOrchestrator<S, D> {
    pub fn with_dispatcher(store: S, dispatcher: D) -> Self {
        Self { store, dispatcher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Load a job, failing with `NotFound` if absent.
    pub async fn load_job(&self, job_id: &JobId) -> PipelineResult<Job> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or_else(|| PipelineError::not_found(format!("jobs/{}", job_id)))
    }

    /// Advance a job through one stage.
    ///
    /// The stage only runs once every earlier stage has completed; a
    /// trigger for a later stage on a job that has not reached it yet is
    /// a no-op. Marks the stage in-progress, runs `work`, then records completion
    /// and moves the job's status to the next stage (or `completed` after
    /// the last one) before triggering that stage. On failure the stage and
    /// job are marked failed before the original error propagates, so a
    /// job is never left silently stuck.
    pub async fn advance<T, F, Fut>(
        &self,
        job_id: &JobId,
        stage: Stage,
        work: F,
    ) -> PipelineResult<AdvanceOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let job = self.load_job(job_id).await?;

        if job.is_terminal() {
            info!(
                job_id = %job_id,
                stage = %stage,
                status = %job.status,
                "Job already terminal, ignoring trigger"
            );
            return Ok(AdvanceOutcome::AlreadyTerminal);
        }

        if job.stages[stage].is_completed() {
            info!(job_id = %job_id, stage = %stage, "Stage already completed, ignoring duplicate trigger");
            return Ok(AdvanceOutcome::AlreadyCompleted);
        }

        // Stages complete strictly in pipeline order; a trigger that
        // arrives ahead of its predecessors is dropped, not reordered.
        if !job.stages.predecessors_completed(stage) {
            info!(
                job_id = %job_id,
                stage = %stage,
                "Earlier stages incomplete, ignoring out-of-order trigger"
            );
            return Ok(AdvanceOutcome::NotReady);
        }

        let mut status = job.stages[stage].clone();
        status.start();
        self.store
            .update_job(
                job_id,
                JobPatch::new()
                    .with_status(stage.running_status())
                    .with_stage(stage, status.clone()),
            )
            .await?;

        match work().await {
            Ok(value) => {
                status.complete();
                let next = stage.next();
                let next_status = next
                    .map(|s| s.running_status())
                    .unwrap_or(JobStatus::Completed);

                self.store
                    .update_job(
                        job_id,
                        JobPatch::new()
                            .with_status(next_status)
                            .with_stage(stage, status),
                    )
                    .await?;

                record_stage_completed(stage);
                info!(job_id = %job_id, stage = %stage, "Stage completed");

                if let Some(next) = next {
                    self.dispatcher.trigger(next, job_id).await;
                }

                Ok(AdvanceOutcome::Completed(value))
            }
            Err(err) => {
                let message = err.to_string();
                status.fail(message.clone());

                // Best-effort: record the failure even if persistence is
                // what failed, so the original error still propagates.
                if let Err(persist_err) = self
                    .store
                    .update_job(
                        job_id,
                        JobPatch::new()
                            .with_status(JobStatus::Failed)
                            .with_error(message.clone())
                            .with_stage(stage, status),
                    )
                    .await
                {
                    error!(
                        job_id = %job_id,
                        stage = %stage,
                        "Failed to record stage failure: {}",
                        persist_err
                    );
                }

                record_stage_failed(stage);
                error!(job_id = %job_id, stage = %stage, "Stage failed: {}", message);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;
    use papercast_models::{ContentId, StageState};
    use papercast_store::MemoryJobStore;

    /// Records triggers for assertions.
    #[derive(Default)]
    struct RecordingDispatcher {
        triggers: Mutex<Vec<(Stage, JobId)>>,
    }

    impl EventDispatcher for &RecordingDispatcher {
        async fn trigger(&self, stage: Stage, job_id: &JobId) {
            self.triggers.lock().unwrap().push((stage, job_id.clone()));
        }
    }

    async fn seeded_store() -> (MemoryJobStore, JobId) {
        let store = MemoryJobStore::new();
        let job = store
            .create_job(Job::new(ContentId::new()))
            .await
            .unwrap();
        (store, job.id)
    }

    #[tokio::test]
    async fn test_advance_completes_stage_and_moves_status() {
        let (store, job_id) = seeded_store().await;
        let orchestrator = StageOrchestrator::new(store.clone());

        let outcome = orchestrator
            .advance(&job_id, Stage::Analysis, || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(outcome.into_output(), Some(7));

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Segmenting);
        let status = &job.stages[Stage::Analysis];
        assert!(status.is_completed());
        assert!(status.started_at.is_some());
        assert!(status.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_last_stage_completes_job() {
        let (store, job_id) = seeded_store().await;
        let orchestrator = StageOrchestrator::new(store.clone());

        for stage in Stage::ALL {
            orchestrator
                .advance(&job_id, stage, || async { Ok(()) })
                .await
                .unwrap();
        }

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.is_terminal());
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let orchestrator = StageOrchestrator::new(MemoryJobStore::new());
        let err = orchestrator
            .advance(&JobId::new(), Stage::Analysis, || async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_trigger_is_noop() {
        let (store, job_id) = seeded_store().await;
        let orchestrator = StageOrchestrator::new(store.clone());
        let calls = AtomicU32::new(0);

        orchestrator
            .advance(&job_id, Stage::Analysis, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap();

        // Two duplicate triggers: work must not run again.
        for _ in 0..2 {
            let outcome = orchestrator
                .advance(&job_id, Stage::Analysis, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                })
                .await
                .unwrap();
            assert_eq!(outcome, AdvanceOutcome::AlreadyCompleted);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_trigger_is_dropped() {
        let (store, job_id) = seeded_store().await;
        let orchestrator = StageOrchestrator::new(store.clone());
        let calls = AtomicU32::new(0);

        // Last stage triggered on a fresh job: nothing may run or complete.
        let outcome = orchestrator
            .advance(&job_id, Stage::AudioSynthesis, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(outcome, AdvanceOutcome::NotReady);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.stages[Stage::Analysis].state, StageState::Pending);
        assert_eq!(job.stages[Stage::AudioSynthesis].state, StageState::Pending);
    }

    #[tokio::test]
    async fn test_stage_skip_is_dropped_mid_pipeline() {
        let (store, job_id) = seeded_store().await;
        let orchestrator = StageOrchestrator::new(store.clone());

        orchestrator
            .advance(&job_id, Stage::Analysis, || async { Ok(()) })
            .await
            .unwrap();

        // Segmentation has not run; script generation must wait for it.
        let outcome = orchestrator
            .advance(&job_id, Stage::ScriptGeneration, || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(outcome, AdvanceOutcome::NotReady);

        // The pipeline still proceeds normally in order.
        orchestrator
            .advance(&job_id, Stage::Segmentation, || async { Ok(()) })
            .await
            .unwrap();
        let outcome = orchestrator
            .advance(&job_id, Stage::ScriptGeneration, || async { Ok(()) })
            .await
            .unwrap();
        assert!(outcome.did_run());
    }

    #[tokio::test]
    async fn test_failure_marks_job_failed_and_propagates() {
        let (store, job_id) = seeded_store().await;
        let orchestrator = StageOrchestrator::new(store.clone());

        let err = orchestrator
            .advance(&job_id, Stage::Analysis, || async {
                Err::<(), _>(PipelineError::external("analyzer melted"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExternalService { .. }));

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("analyzer melted"));
        assert_eq!(job.stages[Stage::Analysis].state, StageState::Failed);
    }

    #[tokio::test]
    async fn test_terminal_job_rejects_further_work() {
        let (store, job_id) = seeded_store().await;
        let orchestrator = StageOrchestrator::new(store.clone());

        let _ = orchestrator
            .advance(&job_id, Stage::Analysis, || async {
                Err::<(), _>(PipelineError::external("boom"))
            })
            .await;

        let calls = AtomicU32::new(0);
        let outcome = orchestrator
            .advance(&job_id, Stage::Segmentation, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(outcome, AdvanceOutcome::AlreadyTerminal);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_next_stage_triggered_on_completion() {
        let (store, job_id) = seeded_store().await;
        let dispatcher = RecordingDispatcher::default();
        let orchestrator = StageOrchestrator::with_dispatcher(store, &dispatcher);

        orchestrator
            .advance(&job_id, Stage::Analysis, || async { Ok(()) })
            .await
            .unwrap();

        let triggers = dispatcher.triggers.lock().unwrap();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0], (Stage::Segmentation, job_id));
    }

    #[tokio::test]
    async fn test_no_trigger_after_last_stage_or_failure() {
        let (store, job_id) = seeded_store().await;
        let dispatcher = RecordingDispatcher::default();
        let orchestrator = StageOrchestrator::with_dispatcher(store.clone(), &dispatcher);

        for stage in Stage::ALL {
            orchestrator
                .advance(&job_id, stage, || async { Ok(()) })
                .await
                .unwrap();
        }
        // Triggers for segmentation, script_generation, audio_synthesis
        // only; nothing after the last stage.
        assert_eq!(dispatcher.triggers.lock().unwrap().len(), 3);

        let failing = store.create_job(Job::new(ContentId::new())).await.unwrap();
        let _ = orchestrator
            .advance(&failing.id, Stage::Analysis, || async {
                Err::<(), _>(PipelineError::external("boom"))
            })
            .await;
        assert_eq!(dispatcher.triggers.lock().unwrap().len(), 3);
    }
}
