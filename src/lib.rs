//! Annal: Content-Addressed Document Provenance Archive
//!
//! An ingestion engine that turns uploaded documents into content-addressed
//! artifacts and verifiable provenance records. Each upload yields the
//! stored file, its extracted transcript and metadata, and a canonical,
//! deterministically-serialized assertion graph relating them — with
//! at-most-one assertion per distinct file content per tenant.
//!
//! # Core Concepts
//!
//! - **Content ids**: digest-derived identifiers; identical bytes always
//!   address the same artifact
//! - **Assertions**: canonical serialized provenance graphs, themselves
//!   content-addressed and immutable
//! - **The pipeline**: an idempotent eight-stage state machine from upload
//!   event to indexed document
//!
//! # Example
//!
//! ```
//! use annal::{Archive, ArchiveConfig, MemoryCas, MemoryIndex};
//! # use annal::{FsObjectFetcher, HttpExtractor};
//! # use std::sync::Arc;
//!
//! # fn wire(fetcher: Arc<FsObjectFetcher>, extractor: Arc<HttpExtractor>) -> Archive {
//! let store = Arc::new(annal::SqliteStore::open_in_memory().unwrap());
//! Archive::new(
//!     fetcher,
//!     extractor,
//!     Arc::new(MemoryCas::new()),
//!     store,
//!     Arc::new(MemoryIndex::new()),
//!     ArchiveConfig::default(),
//! )
//! # }
//! ```

pub mod api;
pub mod assertion;
pub mod cas;
pub mod extract;
pub mod index;
pub mod metadata;
pub mod pipeline;
pub mod source;
pub mod storage;

pub use api::{Archive, BatchOutcome, RecordOutcome, ReindexError, ReindexReport};
pub use assertion::{
    AssertionBuilder, AssertionInput, IncompleteAssertionInput, UriPolicy,
};
pub use cas::{CasError, ContentId, ContentStore, FsCas, MemoryCas};
pub use extract::{ExtractionAgent, ExtractionError, Extractor, HttpExtractor};
pub use index::{HttpSearchIndex, IndexEntry, IndexError, MemoryIndex, SearchIndex};
pub use metadata::{
    MetadataNormalizer, MetadataParseError, NamespaceTable, NormalizedMetadata, NormalizedValue,
};
pub use pipeline::{
    ArchiveConfig, DedupGate, Disposition, IngestError, IngestReceipt, IngestionPipeline, Stage,
};
pub use source::{
    FetchError, FetchedObject, FsObjectFetcher, HttpObjectFetcher, ObjectFetcher, ObjectKey,
    UploadEvent,
};
pub use storage::{
    Assertion, Document, DocumentUpdate, NewDocument, Organization, RecordStore, SqliteStore,
    StoreError, StoreResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
