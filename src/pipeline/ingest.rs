//! Pipeline orchestration.

use super::dedup::DedupGate;
use super::{Disposition, IngestError, IngestReceipt, Stage};
use crate::assertion::{AssertionBuilder, AssertionInput, UriPolicy};
use crate::cas::{canonical_record_bytes, ContentStore};
use crate::extract::Extractor;
use crate::index::{IndexEntry, SearchIndex};
use crate::metadata::{self, MetadataNormalizer, NamespaceTable};
use crate::source::{ObjectFetcher, ObjectKey, UploadEvent};
use crate::storage::{Assertion, DocumentUpdate, NewDocument, RecordStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Archive-wide configuration: URI derivation and the namespace table.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub uris: UriPolicy,
    pub namespaces: NamespaceTable,
    /// Base URL of the upload store, for the file's `schema:contentUrl`.
    pub asset_url_base: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            uris: UriPolicy::default(),
            namespaces: NamespaceTable::default(),
            asset_url_base: "https://assets.annal.archive".to_string(),
        }
    }
}

/// The ingestion pipeline.
///
/// Every collaborator comes in through a trait object, so tests swap in
/// in-memory fakes and production wires real clients. One instance serves
/// many concurrent ingestions; it holds no per-ingestion state and takes
/// no locks — idempotent content-addressed writes plus the record store's
/// own semantics carry cross-request correctness.
///
/// Cancellation safety: dropping the `ingest` future abandons in-flight
/// external calls. Already-stored blobs are content-addressed and
/// reusable, and no relational or index write happens for an abandoned
/// ingestion, so the event can be redelivered end-to-end.
pub struct IngestionPipeline {
    fetcher: Arc<dyn ObjectFetcher>,
    extractor: Arc<dyn Extractor>,
    cas: Arc<dyn ContentStore>,
    store: Arc<dyn RecordStore>,
    index: Arc<dyn SearchIndex>,
    builder: AssertionBuilder,
    normalizer: MetadataNormalizer,
    dedup: DedupGate,
    asset_url_base: String,
}

impl IngestionPipeline {
    pub fn new(
        fetcher: Arc<dyn ObjectFetcher>,
        extractor: Arc<dyn Extractor>,
        cas: Arc<dyn ContentStore>,
        store: Arc<dyn RecordStore>,
        index: Arc<dyn SearchIndex>,
        config: ArchiveConfig,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            cas,
            store: store.clone(),
            index,
            builder: AssertionBuilder::new(config.uris, config.namespaces.clone()),
            normalizer: MetadataNormalizer::new(config.namespaces),
            dedup: DedupGate::new(store),
            asset_url_base: config.asset_url_base.trim_end_matches('/').to_string(),
        }
    }

    /// Run one upload event through the full state machine.
    pub async fn ingest(&self, event: &UploadEvent) -> Result<IngestReceipt, IngestError> {
        // --- Fetch ---
        let key = ObjectKey::decode(&event.key)
            .map_err(|e| IngestError::at(Stage::Fetch, e))?;
        let object = self
            .fetcher
            .fetch(&event.bucket, &event.key)
            .await
            .map_err(|e| IngestError::at(Stage::Fetch, e))?;
        debug!(key = %event.key, size = object.bytes.len(), "fetched upload");

        // --- Address ---
        let file_cid = self
            .cas
            .put(&object.bytes)
            .await
            .map_err(|e| IngestError::at(Stage::Address, e))?;

        // --- DedupCheck ---
        if let Some(prior) = self
            .dedup
            .check(&key.organization_id, &file_cid)
            .await
            .map_err(|e| IngestError::at(Stage::DedupCheck, e))?
        {
            info!(
                organization = %key.organization_id,
                file_cid = %file_cid,
                document = %prior.document_id,
                "duplicate content, returning prior assertion"
            );
            return Ok(IngestReceipt {
                document_id: prior.document_id,
                assertion_cid: prior.assertion_cid,
                disposition: Disposition::Duplicate,
                index_error: None,
            });
        }

        let document_id = object
            .document_id()
            .unwrap_or_else(|| key.file_stem())
            .to_string();
        let file_name = object.file_name().unwrap_or(&key.file_id).to_string();
        let file_url = format!("{}/{}", self.asset_url_base, event.key);
        let content_length = object.bytes.len() as u64;

        // --- Extract: transcript and metadata concurrently, both must
        // succeed — the assertion requires both ---
        let generated_at = Utc::now();
        let text_arm = async {
            let text = self
                .extractor
                .extract_text(&object.bytes, &file_name)
                .await
                .map_err(|e| IngestError::at(Stage::Extract, e))?;
            let cid = self
                .cas
                .put(text.as_bytes())
                .await
                .map_err(|e| IngestError::at(Stage::Extract, e))?;
            Ok::<_, IngestError>((text, cid))
        };
        let meta_arm = async {
            self.extractor
                .extract_metadata(&object.bytes, &file_name)
                .await
                .map_err(|e| IngestError::at(Stage::Extract, e))
        };
        let ((text, transcript_cid), raw_metadata) = tokio::try_join!(text_arm, meta_arm)?;

        // --- Normalize; the raw record is content-addressed in its
        // canonical structured encoding ---
        let normalized = self
            .normalizer
            .normalize(&raw_metadata)
            .map_err(|e| IngestError::at(Stage::Normalize, e))?;
        let record = metadata::raw_record(&raw_metadata)
            .map_err(|e| IngestError::at(Stage::Normalize, e))?;
        let record_bytes = canonical_record_bytes(&record)
            .map_err(|e| IngestError::at(Stage::Normalize, e))?;
        let metadata_cid = self
            .cas
            .put(&record_bytes)
            .await
            .map_err(|e| IngestError::at(Stage::Normalize, e))?;

        // --- Assemble ---
        let input = AssertionInput {
            document_id: document_id.clone(),
            organization_id: key.organization_id.clone(),
            event_time: event.event_time,
            generated_at,
            content_type: object.content_type.clone(),
            content_length,
            file_name: file_name.clone(),
            file_url: file_url.clone(),
            file_cid: Some(file_cid.clone()),
            transcript_cid: Some(transcript_cid),
            transcript_size: text.len() as u64,
            metadata_cid: Some(metadata_cid),
            metadata_size: record_bytes.len() as u64,
            metadata: normalized.clone(),
            agent: self.extractor.agent().clone(),
        };
        let serialized = self
            .builder
            .build(&input)
            .map_err(|e| IngestError::at(Stage::Assemble, e))?;
        let assertion_cid = self
            .cas
            .put(serialized.as_bytes())
            .await
            .map_err(|e| IngestError::at(Stage::Assemble, e))?;

        // --- Persist: document upsert + assertion insert, both or the
        // ingestion failed. Stored blobs stay behind on failure — they
        // are addressable and a retry reuses them. ---
        let persist = |e: crate::storage::StoreError| IngestError::at(Stage::Persist, e);
        let existing = self
            .store
            .find_document(&document_id)
            .await
            .map_err(persist)?;
        let existing = match existing {
            Some(doc) => doc,
            None => {
                let defaults = NewDocument {
                    id: document_id.clone(),
                    organization_id: key.organization_id.clone(),
                    file_url: Some(file_url.clone()),
                    content_type: Some(object.content_type.clone()),
                };
                match self.store.create_document(&defaults).await {
                    Ok(doc) => doc,
                    // a concurrent ingestion may have created it between
                    // find and create; the second find settles it
                    Err(first_err) => self
                        .store
                        .find_document(&document_id)
                        .await
                        .map_err(persist)?
                        .ok_or_else(|| persist(first_err))?,
                }
            }
        };

        let title = normalized.known.title_text().or(existing.title);
        self.store
            .update_document(
                &document_id,
                &DocumentUpdate {
                    title: title.clone(),
                    file_url: Some(file_url.clone()),
                    file_name: Some(file_name),
                    content_type: Some(object.content_type.clone()),
                    language: normalized.known.language_text(),
                    publication_date: normalized.known.date,
                },
            )
            .await
            .map_err(persist)?;

        let assertion = Assertion {
            id: Uuid::new_v4(),
            document_id: document_id.clone(),
            organization_id: key.organization_id.clone(),
            cid: assertion_cid.clone(),
            file_cid,
            created_at: Utc::now(),
        };
        self.store.insert_assertion(&assertion).await.map_err(persist)?;
        info!(
            document = %document_id,
            assertion = %assertion_cid,
            "assertion persisted"
        );

        // --- Index: best-effort; failure rides on the receipt ---
        let entry = IndexEntry {
            title,
            text,
            file_url,
            organization_id: key.organization_id,
            upload_date: generated_at,
            content_length: Some(content_length),
            content_type: Some(object.content_type),
            publication_date: normalized.known.date,
            language: normalized.known.language_text(),
        };
        let index_error = match self.index.upsert(&document_id, &entry).await {
            Ok(()) => None,
            Err(e) => {
                warn!(document = %document_id, error = %e, "index upsert failed");
                Some(e.to_string())
            }
        };

        Ok(IngestReceipt {
            document_id,
            assertion_cid,
            disposition: Disposition::Created,
            index_error,
        })
    }
}
