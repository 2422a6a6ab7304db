//! End-to-end pipeline scenarios over in-memory collaborators.

use annal::{
    Archive, ArchiveConfig, ContentId, ContentStore, Disposition, ExtractionAgent,
    ExtractionError, Extractor, FetchError, FetchedObject, MemoryCas, MemoryIndex, ObjectFetcher,
    RecordStore, SqliteStore, UploadEvent,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory object store keyed by (bucket, key).
#[derive(Default)]
struct FakeObjects {
    objects: HashMap<(String, String), FetchedObject>,
}

impl FakeObjects {
    fn put(&mut self, bucket: &str, key: &str, bytes: &[u8], content_type: &str) {
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            FetchedObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
                metadata: HashMap::new(),
            },
        );
    }
}

#[async_trait]
impl ObjectFetcher for FakeObjects {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject, FetchError> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::Missing {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

/// Scripted extraction service with call counters.
struct FakeExtractor {
    agent: ExtractionAgent,
    transcript: String,
    metadata: String,
    text_calls: AtomicUsize,
    meta_calls: AtomicUsize,
    fail_metadata: AtomicBool,
}

impl FakeExtractor {
    fn new(transcript: &str, metadata: &str) -> Self {
        Self {
            agent: ExtractionAgent::default(),
            transcript: transcript.to_string(),
            metadata: metadata.to_string(),
            text_calls: AtomicUsize::new(0),
            meta_calls: AtomicUsize::new(0),
            fail_metadata: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    fn agent(&self) -> &ExtractionAgent {
        &self.agent
    }

    async fn extract_text(&self, _bytes: &[u8], _name: &str) -> Result<String, ExtractionError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcript.clone())
    }

    async fn extract_metadata(
        &self,
        _bytes: &[u8],
        _name: &str,
    ) -> Result<String, ExtractionError> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(ExtractionError::Service {
                status: 500,
                message: "metadata extraction exploded".to_string(),
            });
        }
        Ok(self.metadata.clone())
    }
}

struct Harness {
    archive: Archive,
    cas: Arc<MemoryCas>,
    store: Arc<SqliteStore>,
    index: Arc<MemoryIndex>,
    extractor: Arc<FakeExtractor>,
}

fn harness(objects: FakeObjects, extractor: FakeExtractor) -> Harness {
    let cas = Arc::new(MemoryCas::new());
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let index = Arc::new(MemoryIndex::new());
    let extractor = Arc::new(extractor);
    let archive = Archive::new(
        Arc::new(objects),
        extractor.clone(),
        cas.clone(),
        store.clone(),
        index.clone(),
        ArchiveConfig::default(),
    );
    Harness {
        archive,
        cas,
        store,
        index,
        extractor,
    }
}

fn event(key: &str, size: u64) -> UploadEvent {
    UploadEvent {
        event_time: "2024-05-01T10:00:00Z".parse().unwrap(),
        bucket: "incoming".to_string(),
        key: key.to_string(),
        size,
    }
}

// === Scenario: one upload becomes a document, an assertion, and an index entry ===
#[tokio::test]
async fn upload_produces_document_assertion_and_index_entry() {
    let mut objects = FakeObjects::default();
    objects.put("incoming", "uploads/org-1/doc-1.pdf", b"%PDF fake bytes", "application/pdf");
    let h = harness(
        objects,
        FakeExtractor::new("hello world", "title,Report\ndc:creator,Jane\n"),
    );

    let receipt = h
        .archive
        .ingest(&event("uploads/org-1/doc-1.pdf", 15))
        .await
        .unwrap();
    assert_eq!(receipt.document_id, "doc-1");
    assert_eq!(receipt.disposition, Disposition::Created);
    assert!(receipt.index_error.is_none());

    // document row created with extracted title
    let doc = h.store.find_document("doc-1").await.unwrap().unwrap();
    assert_eq!(doc.title.as_deref(), Some("Report"));
    assert_eq!(doc.organization_id, "org-1");

    // exactly one assertion row, keyed by the file's content id
    let file_cid = ContentId::of_bytes(b"%PDF fake bytes");
    let row = h
        .store
        .find_assertion_by_content("org-1", &file_cid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.document_id, "doc-1");
    assert_eq!(row.cid, receipt.assertion_cid);

    // the stored assertion links the document to its media and carries
    // the foreign dc:creator property
    let payload = h
        .archive
        .assertion_payload(&receipt.assertion_cid)
        .await
        .unwrap()
        .unwrap();
    assert!(payload.contains("http://schema.org/DigitalDocument"));
    assert!(payload.contains(&file_cid.uri()));
    assert!(payload.contains("http://purl.org/dc/elements/1.1/creator"));
    assert!(payload.contains("\"Jane\""));

    // transcript is content-addressed and retrievable
    let transcript_cid = ContentId::of_bytes(b"hello world");
    assert_eq!(
        h.cas.get(&transcript_cid).await.unwrap().unwrap(),
        b"hello world"
    );

    // index entry carries the transcript text
    let entry = h.index.get("doc-1").unwrap();
    assert_eq!(entry.text, "hello world");
    assert_eq!(entry.title.as_deref(), Some("Report"));
    assert_eq!(entry.content_length, Some(15));
}

// === Scenario: identical content under a different document id short-circuits ===
#[tokio::test]
async fn duplicate_content_returns_prior_assertion_without_extraction() {
    let mut objects = FakeObjects::default();
    objects.put("incoming", "uploads/org-1/doc-1.pdf", b"same bytes", "application/pdf");
    objects.put("incoming", "uploads/org-1/doc-2.pdf", b"same bytes", "application/pdf");
    let h = harness(objects, FakeExtractor::new("text", "title,Report\n"));

    let first = h
        .archive
        .ingest(&event("uploads/org-1/doc-1.pdf", 10))
        .await
        .unwrap();
    assert_eq!(h.extractor.text_calls.load(Ordering::SeqCst), 1);

    let second = h
        .archive
        .ingest(&event("uploads/org-1/doc-2.pdf", 10))
        .await
        .unwrap();
    assert_eq!(second.disposition, Disposition::Duplicate);
    assert_eq!(second.document_id, first.document_id);
    assert_eq!(second.assertion_cid, first.assertion_cid);

    // no second round of extraction calls
    assert_eq!(h.extractor.text_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.extractor.meta_calls.load(Ordering::SeqCst), 1);

    // and no second document row
    assert!(h.store.find_document("doc-2").await.unwrap().is_none());
}

// === Scenario: same content under a different organization is not a duplicate ===
#[tokio::test]
async fn tenants_do_not_share_dedup_state() {
    let mut objects = FakeObjects::default();
    objects.put("incoming", "uploads/org-1/doc-1.pdf", b"shared", "application/pdf");
    objects.put("incoming", "uploads/org-2/doc-9.pdf", b"shared", "application/pdf");
    let h = harness(objects, FakeExtractor::new("text", "title,Report\n"));

    let a = h.archive.ingest(&event("uploads/org-1/doc-1.pdf", 6)).await.unwrap();
    let b = h.archive.ingest(&event("uploads/org-2/doc-9.pdf", 6)).await.unwrap();
    assert_eq!(a.disposition, Disposition::Created);
    assert_eq!(b.disposition, Disposition::Created);
    // identical content, identical assertion inputs except tenant and
    // document identity: still two distinct assertions
    assert_ne!(a.assertion_cid, b.assertion_cid);
}

// === Scenario: metadata extraction failure fails the whole ingestion ===
#[tokio::test]
async fn failed_metadata_extraction_writes_nothing_and_retry_succeeds() {
    let mut objects = FakeObjects::default();
    objects.put("incoming", "uploads/org-1/doc-1.pdf", b"file bytes", "application/pdf");
    let h = harness(objects, FakeExtractor::new("text", "title,Report\n"));
    h.extractor.fail_metadata.store(true, Ordering::SeqCst);

    let err = h
        .archive
        .ingest(&event("uploads/org-1/doc-1.pdf", 10))
        .await
        .unwrap_err();
    assert_eq!(err.stage, annal::Stage::Extract);
    assert!(err.retryable());

    // no relational writes happened
    assert!(h.store.find_document("doc-1").await.unwrap().is_none());
    let file_cid = ContentId::of_bytes(b"file bytes");
    assert!(h
        .store
        .find_assertion_by_content("org-1", &file_cid)
        .await
        .unwrap()
        .is_none());

    // the stored file content remains valid and the retry reuses it
    assert_eq!(h.cas.get(&file_cid).await.unwrap().unwrap(), b"file bytes");
    h.extractor.fail_metadata.store(false, Ordering::SeqCst);
    let receipt = h
        .archive
        .ingest(&event("uploads/org-1/doc-1.pdf", 10))
        .await
        .unwrap();
    assert_eq!(receipt.disposition, Disposition::Created);
}

// === Scenario: malformed metadata payload is fatal, not retryable ===
#[tokio::test]
async fn malformed_metadata_is_fatal() {
    let mut objects = FakeObjects::default();
    objects.put("incoming", "uploads/org-1/doc-1.pdf", b"file bytes", "application/pdf");
    let h = harness(objects, FakeExtractor::new("text", "no-comma-in-this-row\n"));

    let err = h
        .archive
        .ingest(&event("uploads/org-1/doc-1.pdf", 10))
        .await
        .unwrap_err();
    assert_eq!(err.stage, annal::Stage::Normalize);
    assert!(!err.retryable());
}

// === Scenario: re-upload of changed content updates the document in place ===
#[tokio::test]
async fn reupload_updates_document_and_appends_assertion() {
    let mut objects = FakeObjects::default();
    objects.put("incoming", "uploads/org-1/doc-1.pdf", b"version one", "application/pdf");
    let h = harness(objects, FakeExtractor::new("text", "title,First Title\n"));

    let first = h
        .archive
        .ingest(&event("uploads/org-1/doc-1.pdf", 11))
        .await
        .unwrap();

    // same document id, new bytes: rebuild the harness's object, keep state
    // (the fetcher is immutable, so swap archives sharing store/cas/index)
    let mut objects = FakeObjects::default();
    objects.put("incoming", "uploads/org-1/doc-1.pdf", b"version two", "application/pdf");
    let extractor = Arc::new(FakeExtractor::new("text", "title,Second Title\n"));
    let archive = Archive::new(
        Arc::new(objects),
        extractor,
        h.cas.clone(),
        h.store.clone(),
        h.index.clone(),
        ArchiveConfig::default(),
    );

    let second = archive
        .ingest(&event("uploads/org-1/doc-1.pdf", 11))
        .await
        .unwrap();
    assert_eq!(second.disposition, Disposition::Created);
    assert_ne!(second.assertion_cid, first.assertion_cid);

    // one document, updated; the old assertion still resolves by content
    let doc = h.store.find_document("doc-1").await.unwrap().unwrap();
    assert_eq!(doc.title.as_deref(), Some("Second Title"));
    let old = h
        .store
        .find_assertion_by_content("org-1", &ContentId::of_bytes(b"version one"))
        .await
        .unwrap();
    assert!(old.is_some());
}

// === Scenario: a failing record does not abort its batch siblings ===
#[tokio::test]
async fn batch_isolates_record_failures() {
    let mut objects = FakeObjects::default();
    objects.put("incoming", "uploads/org-1/doc-1.pdf", b"exists", "application/pdf");
    // uploads/org-1/doc-2.pdf deliberately absent
    let h = harness(objects, FakeExtractor::new("text", "title,Report\n"));

    let outcome = h
        .archive
        .process_batch(vec![
            event("uploads/org-1/doc-1.pdf", 6),
            event("uploads/org-1/doc-2.pdf", 6),
        ])
        .await;

    assert_eq!(outcome.results.len(), 2);
    assert!(!outcome.all_succeeded());
    assert!(outcome.results[0].result.is_ok());
    let err = outcome.results[1].result.as_ref().unwrap_err();
    assert_eq!(err.stage, annal::Stage::Fetch);
    assert_eq!(outcome.failures().count(), 1);
}

// === Scenario: index failure is surfaced but does not fail the ingestion ===
#[tokio::test]
async fn index_failure_rides_on_a_successful_receipt() {
    struct DownIndex;
    #[async_trait]
    impl annal::SearchIndex for DownIndex {
        async fn upsert(
            &self,
            _id: &str,
            _entry: &annal::IndexEntry,
        ) -> Result<(), annal::IndexError> {
            Err(annal::IndexError::Unavailable("index down".to_string()))
        }
    }

    let mut objects = FakeObjects::default();
    objects.put("incoming", "uploads/org-1/doc-1.pdf", b"bytes", "application/pdf");
    let cas = Arc::new(MemoryCas::new());
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let archive = Archive::new(
        Arc::new(objects),
        Arc::new(FakeExtractor::new("text", "title,Report\n")),
        cas,
        store.clone(),
        Arc::new(DownIndex),
        ArchiveConfig::default(),
    );

    let receipt = archive
        .ingest(&event("uploads/org-1/doc-1.pdf", 5))
        .await
        .unwrap();
    assert_eq!(receipt.disposition, Disposition::Created);
    assert!(receipt.index_error.as_deref().unwrap().contains("index down"));

    // provenance durability was not sacrificed
    assert!(store.find_document("doc-1").await.unwrap().is_some());
}

// === Scenario: reindex rebuilds entries from stored assertions ===
#[tokio::test]
async fn reindex_recovers_index_entries() {
    let mut objects = FakeObjects::default();
    objects.put("incoming", "uploads/org-1/doc-1.pdf", b"file bytes", "application/pdf");
    let h = harness(
        objects,
        FakeExtractor::new("hello world", "title,Report\nlanguage,en\n"),
    );
    h.archive
        .ingest(&event("uploads/org-1/doc-1.pdf", 10))
        .await
        .unwrap();

    // a fresh index, same store and content store: what a new search
    // cluster would look like after data loss
    let fresh_index = Arc::new(MemoryIndex::new());
    let rebuilt = Archive::new(
        Arc::new(FakeObjects::default()),
        Arc::new(FakeExtractor::new("", "")),
        h.cas.clone(),
        h.store.clone(),
        fresh_index.clone(),
        ArchiveConfig::default(),
    );

    let report = rebuilt.reindex().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.indexed, 1);
    assert_eq!(report.skipped, 0);

    let entry = fresh_index.get("doc-1").unwrap();
    assert_eq!(entry.text, "hello world");
    assert_eq!(entry.title.as_deref(), Some("Report"));
    assert_eq!(entry.language.as_deref(), Some("en"));
}
