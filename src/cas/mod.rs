//! Content-addressed storage
//!
//! Every artifact the pipeline produces (file bytes, transcript, metadata
//! record, serialized assertion) is stored by content id. Identical input
//! always yields the identical id, which is what makes deduplication and
//! provenance linking correct: a re-upload of the same bytes converges on
//! the same id no matter which process computed it.

mod fs;
mod memory;

pub use fs::FsCas;
pub use memory::MemoryCas;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from content store operations
#[derive(Debug, Error)]
pub enum CasError {
    /// The backing store is unreachable or failed mid-write. Retryable.
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// The payload exceeds the store's size limit. Fatal for that item.
    #[error("payload of {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// A structured record could not be encoded canonically.
    #[error("record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The id does not name content this store could ever hold.
    #[error("malformed content id: {0}")]
    MalformedId(String),
}

/// Result type for content store operations
pub type CasResult<T> = Result<T, CasError>;

/// A deterministic, digest-derived content identifier.
///
/// Rendered as `b3:<hex>` (a blake3-256 digest). The string form is stable
/// and safe to embed in URIs; [`ContentId::uri`] gives the `cas:` URI used
/// inside assertions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Compute the content id of raw bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("b3:{}", blake3::hash(bytes).to_hex()))
    }

    /// Parse an id previously produced by [`ContentId::of_bytes`].
    pub fn parse(s: &str) -> CasResult<Self> {
        let digest = s
            .strip_prefix("b3:")
            .ok_or_else(|| CasError::MalformedId(s.to_string()))?;
        let raw = hex::decode(digest).map_err(|_| CasError::MalformedId(s.to_string()))?;
        if raw.len() != blake3::OUT_LEN {
            return Err(CasError::MalformedId(s.to_string()));
        }
        // re-encode so equal digests compare equal regardless of input casing
        Ok(Self(format!("b3:{}", hex::encode(raw))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `cas:` URI naming this content inside assertion graphs.
    pub fn uri(&self) -> String {
        format!("cas:{}", self.0)
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode a structured record into canonical bytes.
///
/// `serde_json`'s default map is ordered (BTreeMap), so serializing a
/// `Value` yields lexicographically sorted keys at every level. Do not
/// enable the `preserve_order` feature: it would silently break the
/// content-addressing invariant for records.
pub fn canonical_record_bytes(record: &serde_json::Value) -> CasResult<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

/// Trait for content-addressed blob stores.
///
/// Implementations must be thread-safe (Send + Sync); the pipeline calls
/// them from concurrent ingestion tasks. Writes are idempotent: storing
/// bytes that already exist is a no-op returning the same id.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store raw bytes, returning their content id.
    async fn put(&self, bytes: &[u8]) -> CasResult<ContentId>;

    /// Store a structured record under its canonical encoding.
    async fn put_record(&self, record: &serde_json::Value) -> CasResult<ContentId> {
        let bytes = canonical_record_bytes(record)?;
        self.put(&bytes).await
    }

    /// Retrieve bytes by content id, if present.
    async fn get(&self, id: &ContentId) -> CasResult<Option<Vec<u8>>>;
}
