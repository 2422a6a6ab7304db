//! Upload events and object retrieval
//!
//! The archive learns about new documents from object-store change
//! notifications. Each event names a bucket and key; the key encodes the
//! tenant and file identity (`uploads/<organizationId>/<fileId>.<ext>`),
//! and the object's own metadata carries the document id and original
//! filename set at upload time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Object-metadata key carrying the document id.
pub const DOCUMENT_ID_KEY: &str = "document-id";
/// Object-metadata key carrying the filename the uploader chose.
pub const ORIGINAL_FILENAME_KEY: &str = "original-filename";

/// Errors from event decoding and object retrieval. Retryable by
/// redelivery of the event.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("object {bucket}/{key} not found")]
    Missing { bucket: String, key: String },

    #[error("object store unreachable: {0}")]
    Unreachable(String),

    #[error("malformed object key {0:?}: expected uploads/<organization>/<file>")]
    MalformedKey(String),
}

/// One upload notification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    pub event_time: DateTime<Utc>,
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

/// The tenant/file identity decoded from an object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub organization_id: String,
    pub file_id: String,
}

impl ObjectKey {
    /// Decode `uploads/<organizationId>/<fileId>.<ext>`.
    pub fn decode(key: &str) -> Result<Self, FetchError> {
        let malformed = || FetchError::MalformedKey(key.to_string());
        let mut parts = key.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("uploads"), Some(org), Some(file), None)
                if !org.is_empty() && !file.is_empty() =>
            {
                Ok(Self {
                    organization_id: org.to_string(),
                    file_id: file.to_string(),
                })
            }
            _ => Err(malformed()),
        }
    }

    /// The file id without its extension — the fallback document id when
    /// the object carries no `document-id` metadata.
    pub fn file_stem(&self) -> &str {
        self.file_id
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.file_id)
    }
}

/// A fetched object: bytes plus the metadata the upload layer attached.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

impl FetchedObject {
    pub fn document_id(&self) -> Option<&str> {
        self.metadata.get(DOCUMENT_ID_KEY).map(String::as_str)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.metadata.get(ORIGINAL_FILENAME_KEY).map(String::as_str)
    }
}

/// Trait for upload-store clients.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject, FetchError>;
}

/// Detect a content type from a file extension. Used when the backing
/// store doesn't record one.
pub fn detect_content_type(key: &str) -> &'static str {
    match Path::new(key).extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("md") | Some("markdown") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("odt") => "application/vnd.oasis.opendocument.text",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Local-tree object store: `<root>/<bucket>/<key>`.
///
/// Object metadata rides in an optional `<key>.meta.json` sidecar — a flat
/// string map, mirroring what the upload layer would attach.
pub struct FsObjectFetcher {
    root: PathBuf,
}

impl FsObjectFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectFetcher for FsObjectFetcher {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject, FetchError> {
        let path = self.root.join(bucket).join(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::Missing {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => return Err(FetchError::Unreachable(e.to_string())),
        };

        let mut metadata = HashMap::new();
        let sidecar = PathBuf::from(format!("{}.meta.json", path.display()));
        if let Ok(raw) = tokio::fs::read_to_string(&sidecar).await {
            if let Ok(map) = serde_json::from_str::<HashMap<String, String>>(&raw) {
                metadata = map;
            }
        }

        Ok(FetchedObject {
            bytes,
            content_type: detect_content_type(key).to_string(),
            metadata,
        })
    }
}

/// HTTP object store client (`GET {base}/{bucket}/{key}`).
///
/// Object metadata is read from `x-meta-*` response headers.
#[derive(Clone)]
pub struct HttpObjectFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectFetcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectFetcher for HttpObjectFetcher {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject, FetchError> {
        let url = format!("{}/{}/{}", self.base_url, bucket, key);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::Missing {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(FetchError::Unreachable(format!(
                "GET {} -> {}",
                url,
                resp.status()
            )));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| detect_content_type(key).to_string());

        let mut metadata = HashMap::new();
        for (name, value) in resp.headers() {
            if let Some(meta_key) = name.as_str().strip_prefix("x-meta-") {
                if let Ok(v) = value.to_str() {
                    metadata.insert(meta_key.to_string(), v.to_string());
                }
            }
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?
            .to_vec();

        Ok(FetchedObject {
            bytes,
            content_type,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_well_formed_key() {
        let key = ObjectKey::decode("uploads/org-1/doc-1.pdf").unwrap();
        assert_eq!(key.organization_id, "org-1");
        assert_eq!(key.file_id, "doc-1.pdf");
        assert_eq!(key.file_stem(), "doc-1");
    }

    #[test]
    fn decode_rejects_malformed_keys() {
        for bad in [
            "downloads/org-1/doc-1.pdf",
            "uploads/org-1",
            "uploads/org-1/nested/doc-1.pdf",
            "uploads//doc-1.pdf",
            "",
        ] {
            assert!(ObjectKey::decode(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[tokio::test]
    async fn fs_fetcher_reads_object_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path().join("incoming/uploads/org-1");
        std::fs::create_dir_all(&obj).unwrap();
        std::fs::write(obj.join("doc-1.pdf"), b"%PDF-1.4 fake").unwrap();
        std::fs::write(
            obj.join("doc-1.pdf.meta.json"),
            r#"{"document-id":"doc-1","original-filename":"report.pdf"}"#,
        )
        .unwrap();

        let fetcher = FsObjectFetcher::new(dir.path());
        let fetched = fetcher
            .fetch("incoming", "uploads/org-1/doc-1.pdf")
            .await
            .unwrap();
        assert_eq!(fetched.content_type, "application/pdf");
        assert_eq!(fetched.document_id(), Some("doc-1"));
        assert_eq!(fetched.file_name(), Some("report.pdf"));
    }

    #[tokio::test]
    async fn fs_fetcher_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FsObjectFetcher::new(dir.path());
        let err = fetcher.fetch("incoming", "uploads/org-1/nope.pdf").await;
        assert!(matches!(err, Err(FetchError::Missing { .. })));
    }
}
