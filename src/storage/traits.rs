//! Record store trait definitions

use super::records::{Assertion, Document, DocumentUpdate, NewDocument, Organization};
use crate::cas::ContentId;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during record store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("date parsing error: {0}")]
    DateParse(String),

    #[error("malformed stored content id: {0}")]
    BadContentId(String),

    #[error("malformed stored id: {0}")]
    BadId(String),
}

/// Result type for record store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for the relational record store.
///
/// Implementations must be thread-safe (Send + Sync); the pipeline calls
/// them from concurrent ingestion tasks with no cross-request locking.
/// Correctness under concurrent duplicate uploads is delegated to
/// content-keyed lookups plus the store's own uniqueness semantics, not
/// to callers holding locks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // === Documents ===

    async fn find_document(&self, id: &str) -> StoreResult<Option<Document>>;

    /// Create a document with first-ingestion defaults. Returns the
    /// stored row.
    async fn create_document(&self, doc: &NewDocument) -> StoreResult<Document>;

    /// Refresh a document with the latest known fields; `None` fields are
    /// left untouched.
    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> StoreResult<()>;

    // === Assertions ===

    /// The dedup lookup: the assertion previously recorded for this
    /// organization and file content, if any.
    async fn find_assertion_by_content(
        &self,
        organization_id: &str,
        file_cid: &ContentId,
    ) -> StoreResult<Option<Assertion>>;

    async fn insert_assertion(&self, assertion: &Assertion) -> StoreResult<()>;

    /// Page through documents joined with their newest assertion, ordered
    /// by document id. Used by the reindex job.
    async fn documents_with_latest_assertion(
        &self,
        offset: u64,
        limit: u64,
    ) -> StoreResult<Vec<(Document, Assertion)>>;

    // === Organizations ===

    async fn find_organization(&self, id: &str) -> StoreResult<Option<Organization>>;

    async fn create_organization(&self, organization: &Organization) -> StoreResult<()>;

    async fn list_organizations(&self) -> StoreResult<Vec<Organization>>;
}
