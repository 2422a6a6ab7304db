//! Filesystem-backed content store.
//!
//! Blobs are sharded by the first two digest characters
//! (`<root>/ab/abcdef...`), written to a temp file and renamed into place.
//! A blob that already exists is never rewritten — the id is the proof of
//! content, so the existing file is authoritative.

use super::{CasError, CasResult, ContentId, ContentStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub struct FsCas {
    root: PathBuf,
    limit: Option<usize>,
}

impl FsCas {
    /// Open (creating if needed) a content store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> CasResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| CasError::Unavailable(e.to_string()))?;
        Ok(Self { root, limit: None })
    }

    /// Reject payloads larger than `limit` bytes.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Shard directory and blob path for an id (`<root>/ab/abcdef...`).
    fn blob_paths(&self, id: &ContentId) -> (PathBuf, PathBuf) {
        // id is "b3:<hex>"; shard on the first two hex chars
        let digest = &id.as_str()[3..];
        let shard = self.root.join(&digest[..2]);
        let blob = shard.join(digest);
        (shard, blob)
    }
}

#[async_trait]
impl ContentStore for FsCas {
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
        let (shard, blob) = self.blob_paths(&id);
        if blob.exists() {
            return Ok(id);
        }

        let unavailable = |e: std::io::Error| CasError::Unavailable(e.to_string());
        tokio::fs::create_dir_all(&shard).await.map_err(unavailable)?;

        // temp-then-rename so concurrent writers of the same blob are safe:
        // both write identical bytes and the rename is atomic
        let tmp = shard.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, bytes).await.map_err(unavailable)?;
        tokio::fs::rename(&tmp, &blob).await.map_err(unavailable)?;
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> CasResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.blob_paths(id).1).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CasError::Unavailable(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCas::open(dir.path()).unwrap();
        let a = store.put(b"once").await.unwrap();
        let b = store.put(b"once").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn missing_blob_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCas::open(dir.path()).unwrap();
        let id = ContentId::of_bytes(b"never stored");
        assert!(store.get(&id).await.unwrap().is_none());
    }
}
