//! The ingestion pipeline
//!
//! Turns one upload event into content-addressed artifacts, a canonical
//! assertion, and durable bookkeeping, with at-most-one assertion per
//! distinct file content per tenant.
//!
//! States run in a fixed order:
//!
//! ```text
//! Fetch -> Address -> DedupCheck -> Extract -> Normalize -> Assemble -> Persist -> Index
//! ```
//!
//! A dedup hit at `DedupCheck` short-circuits to a duplicate receipt — no
//! extraction, no storage, no re-indexing. Every failure is tagged with
//! the stage it occurred in; `Index` alone is best-effort, surfacing its
//! failure on an otherwise successful receipt.

mod dedup;
mod ingest;

pub use dedup::{DedupGate, PriorResult};
pub use ingest::{ArchiveConfig, IngestionPipeline};

use crate::assertion::IncompleteAssertionInput;
use crate::cas::{CasError, ContentId};
use crate::extract::ExtractionError;
use crate::index::IndexError;
use crate::metadata::MetadataParseError;
use crate::source::FetchError;
use crate::storage::StoreError;
use serde::Serialize;
use thiserror::Error;

/// The pipeline stage an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Address,
    DedupCheck,
    Extract,
    Normalize,
    Assemble,
    Persist,
    Index,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Address => "address",
            Self::DedupCheck => "dedup-check",
            Self::Extract => "extract",
            Self::Normalize => "normalize",
            Self::Assemble => "assemble",
            Self::Persist => "persist",
            Self::Index => "index",
        };
        write!(f, "{}", name)
    }
}

/// What went wrong, independent of where.
#[derive(Debug, Error)]
pub enum IngestErrorKind {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    MetadataParse(#[from] MetadataParseError),

    #[error(transparent)]
    IncompleteInput(#[from] IncompleteAssertionInput),

    #[error(transparent)]
    ContentStore(#[from] CasError),

    #[error(transparent)]
    RecordStore(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// An ingestion-level failure, tagged with the stage it occurred in.
#[derive(Debug, Error)]
#[error("ingestion failed at {stage}: {kind}")]
pub struct IngestError {
    pub stage: Stage,
    #[source]
    pub kind: IngestErrorKind,
}

impl IngestError {
    pub fn at(stage: Stage, kind: impl Into<IngestErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    /// Whether redelivering the event can be expected to help.
    ///
    /// Content-addressed writes make end-to-end retry safe: everything a
    /// failed ingestion stored is reusable by the retry.
    pub fn retryable(&self) -> bool {
        match &self.kind {
            IngestErrorKind::Fetch(_) => true,
            IngestErrorKind::Extraction(_) => true,
            IngestErrorKind::MetadataParse(_) => false,
            IngestErrorKind::IncompleteInput(_) => false,
            IngestErrorKind::ContentStore(e) => matches!(e, CasError::Unavailable(_)),
            IngestErrorKind::RecordStore(_) => true,
            IngestErrorKind::Index(_) => true,
        }
    }
}

/// How an ingestion concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// A new assertion was built and persisted.
    Created,
    /// The dedup gate matched prior content; the prior result is returned.
    Duplicate,
}

/// The successful outcome of one ingestion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub document_id: String,
    /// Content id of the canonical serialized assertion.
    pub assertion_cid: ContentId,
    pub disposition: Disposition,
    /// Present when indexing failed: record durability succeeded, index
    /// lag is tolerable, but the caller gets to know.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_the_taxonomy() {
        let retryable = IngestError::at(
            Stage::Extract,
            ExtractionError::Unreachable("connection refused".into()),
        );
        assert!(retryable.retryable());

        let fatal = IngestError::at(
            Stage::Normalize,
            MetadataParseError::Row {
                row: 3,
                message: "expected key,value".into(),
            },
        );
        assert!(!fatal.retryable());

        let too_large = IngestError::at(
            Stage::Address,
            CasError::PayloadTooLarge { size: 10, limit: 1 },
        );
        assert!(!too_large.retryable());
    }

    #[test]
    fn errors_name_their_stage() {
        let err = IngestError::at(
            Stage::DedupCheck,
            StoreError::Unavailable("pool exhausted".into()),
        );
        assert!(err.to_string().contains("dedup-check"));
    }
}
