//! Persisted record shapes.

use crate::cas::ContentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document: one logical work per (organization, document id), updated
/// with the latest known metadata on every successful ingestion and never
/// deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub organization_id: String,
    pub title: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub language: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Defaults for creating a document on first ingestion.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub organization_id: String,
    pub file_url: Option<String>,
    pub content_type: Option<String>,
}

/// Fields refreshed on every subsequent ingestion. `None` leaves the
/// stored value untouched — updates never erase what an earlier
/// ingestion learned.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub language: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
}

/// An assertion row: the durable pointer from (organization, file
/// content) to the canonical serialized assertion. Immutable once
/// created; re-uploads of distinct content append new rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub id: Uuid,
    pub document_id: String,
    pub organization_id: String,
    /// Content id of the serialized assertion itself.
    pub cid: ContentId,
    /// Content id of the uploaded file — the dedup key within a tenant.
    pub file_cid: ContentId,
    pub created_at: DateTime<Utc>,
}

/// A tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
