//! In-memory content store, used by tests and the default local wiring.

use super::{CasError, CasResult, ContentId, ContentStore};
use async_trait::async_trait;
use dashmap::DashMap;

/// In-memory content-addressed store.
///
/// Thread-safe via [`DashMap`]; contents live for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryCas {
    blobs: DashMap<ContentId, Vec<u8>>,
    limit: Option<usize>,
}

impl MemoryCas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject payloads larger than `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            blobs: DashMap::new(),
            limit: Some(limit),
        }
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryCas {
    async fn put(&self, bytes: &[u8]) -> CasResult<ContentId> {
        if let Some(limit) = self.limit {
            if bytes.len() > limit {
                return Err(CasError::PayloadTooLarge {
                    size: bytes.len(),
                    limit,
                });
            }
        }
        let id = ContentId::of_bytes(bytes);
        self.blobs.entry(id.clone()).or_insert_with(|| bytes.to_vec());
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> CasResult<Option<Vec<u8>>> {
        Ok(self.blobs.get(id).map(|b| b.clone()))
    }
}
