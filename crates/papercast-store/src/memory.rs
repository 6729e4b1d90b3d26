//! In-memory store implementations.
//!
//! Used by tests and local runs. Both stores are cheap to clone and safe
//! under concurrent use; a write lock spans each read-modify-write so patch
//! application is atomic per record.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use papercast_models::{ContentId, ContentPatch, ContentRecord, Job, JobId, JobPatch};

use crate::content_store::ContentStore;
use crate::error::{StoreError, StoreResult};
use crate::job_store::JobStore;

/// In-memory job store.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for MemoryJobStore {
    async fn create_job(&self, job: Job) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(StoreError::already_exists(format!("jobs/{}", job.id)));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().unwrap().get(id).cloned())
    }

    async fn update_job(&self, id: &JobId, patch: JobPatch) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("jobs/{}", id)))?;
        patch.apply(job);
        Ok(job.clone())
    }
}

/// In-memory content store.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    records: Arc<RwLock<HashMap<ContentId, ContentRecord>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for MemoryContentStore {
    async fn create_content(&self, id: &ContentId) -> StoreResult<ContentRecord> {
        let mut records = self.records.write().unwrap();
        if records.contains_key(id) {
            return Err(StoreError::already_exists(format!("content/{}", id)));
        }
        let record = ContentRecord::new(id.clone());
        records.insert(id.clone(), record.clone());
        Ok(record)
    }

    async fn get_content(&self, id: &ContentId) -> StoreResult<Option<ContentRecord>> {
        Ok(self.records.read().unwrap().get(id).cloned())
    }

    async fn update_content(&self, id: &ContentId, patch: ContentPatch) -> StoreResult<ContentRecord> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("content/{}", id)))?;
        patch.apply(record);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papercast_models::{JobStatus, Stage, StageState, StageStatus};

    #[tokio::test]
    async fn test_create_and_get_job() {
        let store = MemoryJobStore::new();
        let job = store.create_job(Job::new(ContentId::new())).await.unwrap();

        let fetched = store.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = MemoryJobStore::new();
        let job = store.create_job(Job::new(ContentId::new())).await.unwrap();

        let err = store.create_job(job).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_missing_job_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store
            .update_job(&JobId::new(), JobPatch::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stage_patch_preserves_history() {
        let store = MemoryJobStore::new();
        let job = store.create_job(Job::new(ContentId::new())).await.unwrap();

        let mut analysis = StageStatus::default();
        analysis.start();
        analysis.complete();
        store
            .update_job(
                &job.id,
                JobPatch::new()
                    .with_status(JobStatus::Segmenting)
                    .with_stage(Stage::Analysis, analysis),
            )
            .await
            .unwrap();

        let mut segmentation = StageStatus::default();
        segmentation.start();
        let updated = store
            .update_job(
                &job.id,
                JobPatch::new().with_stage(Stage::Segmentation, segmentation),
            )
            .await
            .unwrap();

        // The second patch must not drop the analysis record.
        assert!(updated.stages[Stage::Analysis].is_completed());
        assert_eq!(
            updated.stages[Stage::Segmentation].state,
            StageState::InProgress
        );
    }

    #[tokio::test]
    async fn test_content_round_trip() {
        let store = MemoryContentStore::new();
        let id = ContentId::new();
        store.create_content(&id).await.unwrap();

        let updated = store
            .update_content(
                &id,
                ContentPatch::new().with_raw_analysis(serde_json::json!({"pages": 3})),
            )
            .await
            .unwrap();
        assert!(updated.raw_analysis.is_some());

        let missing = store.get_content(&ContentId::new()).await.unwrap();
        assert!(missing.is_none());
    }
}
