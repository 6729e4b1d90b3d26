//! Job persistence contract.

use std::future::Future;

use papercast_models::{Job, JobId, JobPatch};

use crate::error::StoreResult;

/// Persistence contract for jobs.
///
/// `update_job` must apply the patch as a merge: stage updates replace only
/// the named stage's record and never drop prior stage history. Any backend
/// with atomic partial updates to a job document satisfies this contract.
pub trait JobStore: Send + Sync {
    /// Create a new job. Fails with `AlreadyExists` on ID collision.
    fn create_job(&self, job: Job) -> impl Future<Output = StoreResult<Job>> + Send;

    /// Fetch a job by ID, or `None` if absent.
    fn get_job(&self, id: &JobId) -> impl Future<Output = StoreResult<Option<Job>>> + Send;

    /// Apply a merge-only patch and return the updated job.
    /// Fails with `NotFound` if the job does not exist.
    fn update_job(
        &self,
        id: &JobId,
        patch: JobPatch,
    ) -> impl Future<Output = StoreResult<Job>> + Send;
}
