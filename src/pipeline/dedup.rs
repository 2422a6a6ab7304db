//! The dedup gate: check-then-claim over content-keyed assertions.

use crate::cas::ContentId;
use crate::storage::{RecordStore, StoreResult};
use std::sync::Arc;

/// The prior result returned when content was already asserted.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorResult {
    pub document_id: String,
    pub assertion_cid: ContentId,
}

/// Gate consulted after addressing, before extraction.
///
/// The "claim" half is deliberately deferred: an assertion row is only
/// inserted once a new assertion has actually been built and stored, so a
/// crash between check and claim leaves nothing to clean up. Two
/// concurrent duplicate uploads may both pass the gate and both insert —
/// a benign race, since inserts are content-keyed and later readers
/// observe the same file content id either way.
pub struct DedupGate {
    store: Arc<dyn RecordStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Look up a prior assertion for this tenant and file content.
    /// `None` signals the pipeline to proceed.
    pub async fn check(
        &self,
        organization_id: &str,
        file_cid: &ContentId,
    ) -> StoreResult<Option<PriorResult>> {
        Ok(self
            .store
            .find_assertion_by_content(organization_id, file_cid)
            .await?
            .map(|assertion| PriorResult {
                document_id: assertion.document_id,
                assertion_cid: assertion.cid,
            }))
    }
}
