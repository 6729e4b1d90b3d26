//! Content persistence contract.

use std::future::Future;

use papercast_models::{ContentId, ContentPatch, ContentRecord};

use crate::error::StoreResult;

/// Persistence contract for content records.
pub trait ContentStore: Send + Sync {
    /// Create an empty content record for a new document.
    /// Fails with `AlreadyExists` on ID collision.
    fn create_content(
        &self,
        id: &ContentId,
    ) -> impl Future<Output = StoreResult<ContentRecord>> + Send;

    /// Fetch a content record by ID, or `None` if absent.
    fn get_content(
        &self,
        id: &ContentId,
    ) -> impl Future<Output = StoreResult<Option<ContentRecord>>> + Send;

    /// Apply a merge-only patch and return the updated record.
    /// Fails with `NotFound` if the record does not exist.
    fn update_content(
        &self,
        id: &ContentId,
        patch: ContentPatch,
    ) -> impl Future<Output = StoreResult<ContentRecord>> + Send;
}
