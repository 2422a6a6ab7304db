//! Extraction service boundary
//!
//! Two logically independent calls against the same service: "extract
//! transcript" (plain text) and "extract metadata" (tabular key/value
//! payload). Both take the raw file bytes plus a filename hint. The
//! pipeline runs them concurrently and requires both to succeed.

use crate::assertion::Iri;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from the extraction service. All retryable by redelivery.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction service unreachable: {0}")]
    Unreachable(String),

    #[error("extraction service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("extraction response unreadable: {0}")]
    Response(String),
}

/// Identity of the extraction agent as asserted in provenance graphs:
/// the agent URI, the two role URIs distinguishing text extraction from
/// metadata extraction, and the encoding formats of its outputs.
#[derive(Debug, Clone)]
pub struct ExtractionAgent {
    pub agent: Iri,
    pub text_role: Iri,
    pub metadata_role: Iri,
    pub transcript_format: String,
    pub metadata_format: String,
}

impl Default for ExtractionAgent {
    fn default() -> Self {
        Self {
            agent: Iri::new("http://annal.archive/agent/extraction-service"),
            text_role: Iri::new("http://annal.archive/role/text-extraction"),
            metadata_role: Iri::new("http://annal.archive/role/metadata-extraction"),
            transcript_format: "text/plain".to_string(),
            metadata_format: "application/json".to_string(),
        }
    }
}

/// Trait for extraction service clients.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// The agent identity recorded in assertions built from this
    /// extractor's output.
    fn agent(&self) -> &ExtractionAgent;

    /// Extract the plain-text transcript.
    async fn extract_text(&self, bytes: &[u8], file_name: &str)
        -> Result<String, ExtractionError>;

    /// Extract the raw metadata payload (tabular or JSON form; the
    /// normalizer handles both).
    async fn extract_metadata(
        &self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<String, ExtractionError>;
}

/// HTTP client for a Tika-style extraction service.
///
/// `PUT {base}/text` and `PUT {base}/meta`, file bytes as the body, the
/// filename hint in a `file-name` header. Cheap to clone — the inner
/// [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpExtractor {
    client: reqwest::Client,
    base_url: String,
    agent: ExtractionAgent,
}

impl HttpExtractor {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ExtractionError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: ExtractionAgent::default(),
        })
    }

    /// Override the asserted agent identity (e.g. a pinned, published
    /// description of the deployed extractor version).
    pub fn with_agent(mut self, agent: ExtractionAgent) -> Self {
        self.agent = agent;
        self
    }

    async fn put(
        &self,
        path: &str,
        accept: &str,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<String, ExtractionError> {
        let resp = self
            .client
            .put(format!("{}{}", self.base_url, path))
            .header("Accept", accept)
            .header("file-name", file_name)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| ExtractionError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ExtractionError::Service {
                status: status.as_u16(),
                message,
            });
        }
        resp.text()
            .await
            .map_err(|e| ExtractionError::Response(e.to_string()))
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    fn agent(&self) -> &ExtractionAgent {
        &self.agent
    }

    async fn extract_text(
        &self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<String, ExtractionError> {
        self.put("/text", &self.agent.transcript_format, bytes, file_name)
            .await
    }

    async fn extract_metadata(
        &self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<String, ExtractionError> {
        self.put("/meta", &self.agent.metadata_format, bytes, file_name)
            .await
    }
}
