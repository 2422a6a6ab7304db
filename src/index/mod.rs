//! Search index boundary
//!
//! Indexing is best-effort relative to record durability: an ingestion
//! whose index upsert fails still counts as ingested, the failure is
//! surfaced on the receipt, and the reindex job is the recovery path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from the search index. Retryable via the reindex job.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("search index unavailable: {0}")]
    Unavailable(String),

    #[error("search index rejected upsert: {0}")]
    Rejected(String),
}

/// What gets indexed per document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Full transcript text — the body searches run against.
    pub text: String,
    pub file_url: String,
    pub organization_id: String,
    pub upload_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Trait for search index clients.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, document_id: &str, entry: &IndexEntry) -> Result<(), IndexError>;
}

/// In-memory index, used by tests and the default local wiring.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: DashMap<String, IndexEntry>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, document_id: &str) -> Option<IndexEntry> {
        self.entries.get(document_id).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn upsert(&self, document_id: &str, entry: &IndexEntry) -> Result<(), IndexError> {
        self.entries.insert(document_id.to_string(), entry.clone());
        Ok(())
    }
}

/// HTTP search index client (`PUT {base}/{collection}/{id}` with a JSON
/// body).
#[derive(Clone)]
pub struct HttpSearchIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

impl HttpSearchIndex {
    pub fn new(base_url: impl Into<String>) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: "documents".to_string(),
        })
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn upsert(&self, document_id: &str, entry: &IndexEntry) -> Result<(), IndexError> {
        let resp = self
            .client
            .put(format!(
                "{}/{}/{}",
                self.base_url, self.collection, document_id
            ))
            .json(entry)
            .send()
            .await
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(IndexError::Rejected(format!("{}: {}", status, message)));
        }
        Ok(())
    }
}
