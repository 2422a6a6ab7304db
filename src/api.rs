//! Transport-independent API layer.
//!
//! `Archive` is the single entry point for consumer-facing operations.
//! Transports (the CLI, an HTTP event handler, direct embedding) call
//! `Archive` methods — they never reach into `IngestionPipeline` or the
//! stores directly.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assertion::{canon, AssertionBuilder};
use crate::cas::{CasError, ContentId, ContentStore};
use crate::extract::Extractor;
use crate::index::{IndexEntry, SearchIndex};
use crate::pipeline::{ArchiveConfig, IngestError, IngestReceipt, IngestionPipeline, Stage};
use crate::source::{FetchError, ObjectFetcher, UploadEvent};
use crate::storage::{Document, Organization, RecordStore, StoreError, StoreResult};

/// Single entry point for all consumer-facing operations.
#[derive(Clone)]
pub struct Archive {
    pipeline: Arc<IngestionPipeline>,
    store: Arc<dyn RecordStore>,
    cas: Arc<dyn ContentStore>,
    index: Arc<dyn SearchIndex>,
}

/// Per-record result of batch processing. Failures are isolated: one
/// failing record never aborts its siblings.
#[derive(Debug)]
pub struct RecordOutcome {
    pub key: String,
    pub result: Result<IngestReceipt, IngestError>,
}

/// Aggregated batch result, in input order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<RecordOutcome>,
}

impl BatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.results.iter().filter(|r| r.result.is_err())
    }
}

/// Errors from the reindex job's paging machinery. Per-document failures
/// are skipped and counted, not raised.
#[derive(Debug, Error)]
pub enum ReindexError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a reindex run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReindexReport {
    pub scanned: u64,
    pub indexed: u64,
    pub skipped: u64,
}

const REINDEX_PAGE_SIZE: u64 = 10;

impl Archive {
    pub fn new(
        fetcher: Arc<dyn ObjectFetcher>,
        extractor: Arc<dyn Extractor>,
        cas: Arc<dyn ContentStore>,
        store: Arc<dyn RecordStore>,
        index: Arc<dyn SearchIndex>,
        config: ArchiveConfig,
    ) -> Self {
        let pipeline = IngestionPipeline::new(
            fetcher,
            extractor,
            cas.clone(),
            store.clone(),
            index.clone(),
            config,
        );
        Self {
            pipeline: Arc::new(pipeline),
            store,
            cas,
            index,
        }
    }

    // --- Ingestion ---

    /// Ingest a single upload event.
    pub async fn ingest(&self, event: &UploadEvent) -> Result<IngestReceipt, IngestError> {
        self.pipeline.ingest(event).await
    }

    /// Process a batch of upload events, each as an independent concurrent
    /// task. Results come back in input order with per-record isolation.
    pub async fn process_batch(&self, events: Vec<UploadEvent>) -> BatchOutcome {
        let handles: Vec<_> = events
            .into_iter()
            .map(|event| {
                let pipeline = self.pipeline.clone();
                let key = event.key.clone();
                (
                    key,
                    tokio::spawn(async move { pipeline.ingest(&event).await }),
                )
            })
            .collect();

        let mut outcome = BatchOutcome::default();
        for (key, handle) in handles {
            match handle.await {
                Ok(result) => outcome.results.push(RecordOutcome { key, result }),
                Err(join_err) => {
                    // a panicked/aborted task; surface it as a retryable
                    // record failure rather than poisoning the batch
                    warn!(key = %key, error = %join_err, "ingestion task died");
                    outcome.results.push(RecordOutcome {
                        key,
                        result: Err(IngestError::at(
                            Stage::Fetch,
                            FetchError::Unreachable(format!("ingestion task died: {}", join_err)),
                        )),
                    });
                }
            }
        }
        outcome
    }

    // --- Reads ---

    pub async fn document(&self, id: &str) -> StoreResult<Option<Document>> {
        self.store.find_document(id).await
    }

    /// Fetch a stored assertion's canonical serialized payload.
    pub async fn assertion_payload(&self, cid: &ContentId) -> Result<Option<String>, CasError> {
        Ok(self
            .cas
            .get(cid)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    // --- Organizations ---

    pub async fn register_organization(
        &self,
        slug: &str,
        name: &str,
    ) -> StoreResult<Organization> {
        let organization = Organization {
            id: Uuid::new_v4().to_string(),
            slug: slug.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.store.create_organization(&organization).await?;
        Ok(organization)
    }

    pub async fn list_organizations(&self) -> StoreResult<Vec<Organization>> {
        self.store.list_organizations().await
    }

    // --- Reindex ---

    /// Rebuild search index entries from stored assertions.
    ///
    /// Pages through documents joined with their newest assertion, parses
    /// each assertion's canonical payload back into statements, recovers
    /// the transcript content id, and re-upserts the index entry. A
    /// document whose artifacts can't be recovered is counted and
    /// skipped.
    pub async fn reindex(&self) -> Result<ReindexReport, ReindexError> {
        let mut report = ReindexReport::default();
        let mut offset = 0;

        loop {
            let page = self
                .store
                .documents_with_latest_assertion(offset, REINDEX_PAGE_SIZE)
                .await?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as u64;

            for (document, assertion) in page {
                report.scanned += 1;
                match self.reindex_one(&document, &assertion.cid).await {
                    Ok(()) => report.indexed += 1,
                    Err(reason) => {
                        warn!(document = %document.id, %reason, "reindex skipped");
                        report.skipped += 1;
                    }
                }
            }
        }

        info!(
            scanned = report.scanned,
            indexed = report.indexed,
            skipped = report.skipped,
            "reindex complete"
        );
        Ok(report)
    }

    async fn reindex_one(&self, document: &Document, cid: &ContentId) -> Result<(), String> {
        let payload = self
            .cas
            .get(cid)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("assertion {} missing from content store", cid))?;
        let payload = String::from_utf8_lossy(&payload);

        let statements = canon::parse(&payload).map_err(|e| e.to_string())?;
        let recovered = AssertionBuilder::read_back(&statements);

        let transcript_cid = recovered
            .transcript_cid
            .ok_or("assertion carries no transcript reference")?;
        let text = self
            .cas
            .get(&transcript_cid)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("transcript {} missing from content store", transcript_cid))?;

        let entry = IndexEntry {
            title: recovered.title.or_else(|| document.title.clone()),
            text: String::from_utf8_lossy(&text).into_owned(),
            file_url: document.file_url.clone().unwrap_or_default(),
            organization_id: document.organization_id.clone(),
            upload_date: document.created_at,
            content_length: None,
            content_type: document.content_type.clone(),
            publication_date: recovered.publication_date.or(document.publication_date),
            language: recovered.language.or_else(|| document.language.clone()),
        };
        self.index
            .upsert(&document.id, &entry)
            .await
            .map_err(|e| e.to_string())
    }
}
