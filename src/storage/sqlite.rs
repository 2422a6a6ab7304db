//! SQLite record store.

use super::records::{Assertion, Document, DocumentUpdate, NewDocument, Organization};
use super::traits::{RecordStore, StoreError, StoreResult};
use crate::cas::ContentId;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed record store.
///
/// A single database file with tables for documents, assertions, and
/// organizations. Thread-safe via internal mutex on the connection; WAL
/// mode keeps reads flowing while an ingestion writes.
///
/// The `(organization_id, file_cid)` index backs the dedup lookup. It is
/// deliberately NOT unique: the dedup gate's read-before-write pattern
/// admits a benign race where two concurrent duplicate uploads both
/// insert, and both rows resolve to the same file content.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                title TEXT,
                file_url TEXT,
                file_name TEXT,
                content_type TEXT,
                language TEXT,
                publication_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_organization
                ON documents(organization_id);

            CREATE TABLE IF NOT EXISTS assertions (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                cid TEXT NOT NULL,
                file_cid TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id)
            );

            -- Backs the dedup lookup (find by organization + file content)
            CREATE INDEX IF NOT EXISTS idx_assertions_content
                ON assertions(organization_id, file_cid);
            CREATE INDEX IF NOT EXISTS idx_assertions_document
                ON assertions(document_id, created_at);

            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_document(row: &Row<'_>) -> Result<RawDocument, rusqlite::Error> {
        Ok(RawDocument {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            title: row.get(2)?,
            file_url: row.get(3)?,
            file_name: row.get(4)?,
            content_type: row.get(5)?,
            language: row.get(6)?,
            publication_date: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn row_to_assertion(row: &Row<'_>) -> Result<RawAssertion, rusqlite::Error> {
        Ok(RawAssertion {
            id: row.get(0)?,
            document_id: row.get(1)?,
            organization_id: row.get(2)?,
            cid: row.get(3)?,
            file_cid: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, organization_id, title, file_url, file_name, content_type, language, \
     publication_date, created_at, updated_at";
const ASSERTION_COLUMNS: &str =
    "id, document_id, organization_id, cid, file_cid, created_at";

/// Column-shaped intermediates: text timestamps and ids are parsed into
/// typed form in one place so every query shares the same conversions.
struct RawDocument {
    id: String,
    organization_id: String,
    title: Option<String>,
    file_url: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    language: Option<String>,
    publication_date: Option<String>,
    created_at: String,
    updated_at: String,
}

struct RawAssertion {
    id: String,
    document_id: String,
    organization_id: String,
    cid: String,
    file_cid: String,
    created_at: String,
}

fn parse_date(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::DateParse(format!("{}: {}", s, e)))
}

fn format_date(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_cid(s: &str) -> StoreResult<ContentId> {
    ContentId::parse(s).map_err(|_| StoreError::BadContentId(s.to_string()))
}

impl TryFrom<RawDocument> for Document {
    type Error = StoreError;

    fn try_from(raw: RawDocument) -> StoreResult<Self> {
        Ok(Document {
            id: raw.id,
            organization_id: raw.organization_id,
            title: raw.title,
            file_url: raw.file_url,
            file_name: raw.file_name,
            content_type: raw.content_type,
            language: raw.language,
            publication_date: raw.publication_date.as_deref().map(parse_date).transpose()?,
            created_at: parse_date(&raw.created_at)?,
            updated_at: parse_date(&raw.updated_at)?,
        })
    }
}

impl TryFrom<RawAssertion> for Assertion {
    type Error = StoreError;

    fn try_from(raw: RawAssertion) -> StoreResult<Self> {
        Ok(Assertion {
            id: raw.id.parse().map_err(|_| StoreError::BadId(raw.id.clone()))?,
            document_id: raw.document_id,
            organization_id: raw.organization_id,
            cid: parse_cid(&raw.cid)?,
            file_cid: parse_cid(&raw.file_cid)?,
            created_at: parse_date(&raw.created_at)?,
        })
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_document(&self, id: &str) -> StoreResult<Option<Document>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id],
                Self::row_to_document,
            )
            .optional()?;
        raw.map(Document::try_from).transpose()
    }

    async fn create_document(&self, doc: &NewDocument) -> StoreResult<Document> {
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO documents (id, organization_id, file_url, content_type, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                doc.id,
                doc.organization_id,
                doc.file_url,
                doc.content_type,
                format_date(now),
                format_date(now),
            ],
        )?;
        Ok(Document {
            id: doc.id.clone(),
            organization_id: doc.organization_id.clone(),
            title: None,
            file_url: doc.file_url.clone(),
            file_name: None,
            content_type: doc.content_type.clone(),
            language: None,
            publication_date: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE documents SET
                title = COALESCE(?2, title),
                file_url = COALESCE(?3, file_url),
                file_name = COALESCE(?4, file_name),
                content_type = COALESCE(?5, content_type),
                language = COALESCE(?6, language),
                publication_date = COALESCE(?7, publication_date),
                updated_at = ?8
            WHERE id = ?1
            "#,
            params![
                id,
                update.title,
                update.file_url,
                update.file_name,
                update.content_type,
                update.language,
                update.publication_date.map(format_date),
                format_date(Utc::now()),
            ],
        )?;
        Ok(())
    }

    async fn find_assertion_by_content(
        &self,
        organization_id: &str,
        file_cid: &ContentId,
    ) -> StoreResult<Option<Assertion>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM assertions \
                     WHERE organization_id = ?1 AND file_cid = ?2 \
                     ORDER BY created_at ASC LIMIT 1",
                    ASSERTION_COLUMNS
                ),
                params![organization_id, file_cid.as_str()],
                Self::row_to_assertion,
            )
            .optional()?;
        raw.map(Assertion::try_from).transpose()
    }

    async fn insert_assertion(&self, assertion: &Assertion) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO assertions (id, document_id, organization_id, cid, file_cid, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                assertion.id.to_string(),
                assertion.document_id,
                assertion.organization_id,
                assertion.cid.as_str(),
                assertion.file_cid.as_str(),
                format_date(assertion.created_at),
            ],
        )?;
        Ok(())
    }

    async fn documents_with_latest_assertion(
        &self,
        offset: u64,
        limit: u64,
    ) -> StoreResult<Vec<(Document, Assertion)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT d.id, d.organization_id, d.title, d.file_url, d.file_name,
                   d.content_type, d.language, d.publication_date, d.created_at, d.updated_at,
                   a.id, a.document_id, a.organization_id, a.cid, a.file_cid, a.created_at
            FROM documents d
            JOIN assertions a ON a.id = (
                SELECT id FROM assertions
                WHERE document_id = d.id
                ORDER BY created_at DESC LIMIT 1
            )
            ORDER BY d.id
            LIMIT ?1 OFFSET ?2
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            let doc = Self::row_to_document(row)?;
            let assertion = RawAssertion {
                id: row.get(10)?,
                document_id: row.get(11)?,
                organization_id: row.get(12)?,
                cid: row.get(13)?,
                file_cid: row.get(14)?,
                created_at: row.get(15)?,
            };
            Ok((doc, assertion))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (doc, assertion) = row?;
            out.push((Document::try_from(doc)?, Assertion::try_from(assertion)?));
        }
        Ok(out)
    }

    async fn find_organization(&self, id: &str) -> StoreResult<Option<Organization>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, slug, name, created_at FROM organizations WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, slug, name, created_at)| {
            Ok(Organization {
                id,
                slug,
                name,
                created_at: parse_date(&created_at)?,
            })
        })
        .transpose()
    }

    async fn create_organization(&self, organization: &Organization) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO organizations (id, slug, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                organization.id,
                organization.slug,
                organization.name,
                format_date(organization.created_at),
            ],
        )?;
        Ok(())
    }

    async fn list_organizations(&self) -> StoreResult<Vec<Organization>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, slug, name, created_at FROM organizations ORDER BY slug")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, slug, name, created_at) = row?;
            out.push(Organization {
                id,
                slug,
                name,
                created_at: parse_date(&created_at)?,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_doc(id: &str) -> NewDocument {
        NewDocument {
            id: id.to_string(),
            organization_id: "org-1".to_string(),
            file_url: Some("https://assets.test/uploads/org-1/doc-1.pdf".to_string()),
            content_type: Some("application/pdf".to_string()),
        }
    }

    // fixed millisecond-precision timestamp: the store round-trips RFC 3339
    // with millis, so row equality needs inputs it can represent exactly
    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn assertion_row(document_id: &str, file_cid: &ContentId) -> Assertion {
        Assertion {
            id: uuid::Uuid::new_v4(),
            document_id: document_id.to_string(),
            organization_id: "org-1".to_string(),
            cid: ContentId::of_bytes(b"assertion payload"),
            file_cid: file_cid.clone(),
            created_at: ts("2024-05-01T10:00:00.000Z"),
        }
    }

    #[tokio::test]
    async fn document_create_find_update() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_document(&new_doc("doc-1")).await.unwrap();

        let found = store.find_document("doc-1").await.unwrap().unwrap();
        assert_eq!(found.organization_id, "org-1");
        assert!(found.title.is_none());

        store
            .update_document(
                "doc-1",
                &DocumentUpdate {
                    title: Some("Report".to_string()),
                    language: Some("en".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let found = store.find_document("doc-1").await.unwrap().unwrap();
        assert_eq!(found.title.as_deref(), Some("Report"));
        assert_eq!(found.language.as_deref(), Some("en"));
        // COALESCE keeps fields the update didn't carry
        assert!(found.file_url.is_some());
    }

    #[tokio::test]
    async fn update_never_erases_known_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_document(&new_doc("doc-1")).await.unwrap();
        store
            .update_document(
                "doc-1",
                &DocumentUpdate {
                    title: Some("First title".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .update_document("doc-1", &DocumentUpdate::default())
            .await
            .unwrap();

        let found = store.find_document("doc-1").await.unwrap().unwrap();
        assert_eq!(found.title.as_deref(), Some("First title"));
    }

    #[tokio::test]
    async fn assertion_content_lookup() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_document(&new_doc("doc-1")).await.unwrap();

        let file_cid = ContentId::of_bytes(b"file bytes");
        let row = assertion_row("doc-1", &file_cid);
        store.insert_assertion(&row).await.unwrap();

        let found = store
            .find_assertion_by_content("org-1", &file_cid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, row);

        // other tenants never see it
        assert!(store
            .find_assertion_by_content("org-2", &file_cid)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn reindex_paging_returns_newest_assertion() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_document(&new_doc("doc-1")).await.unwrap();

        let older = Assertion {
            created_at: ts("2024-05-01T09:00:00.000Z"),
            ..assertion_row("doc-1", &ContentId::of_bytes(b"v1"))
        };
        let newer = assertion_row("doc-1", &ContentId::of_bytes(b"v2"));
        store.insert_assertion(&older).await.unwrap();
        store.insert_assertion(&newer).await.unwrap();

        let page = store.documents_with_latest_assertion(0, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].1, newer);

        let empty = store.documents_with_latest_assertion(10, 10).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn organizations_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let org = Organization {
            id: "org-1".to_string(),
            slug: "acme".to_string(),
            name: "Acme Corp".to_string(),
            created_at: Utc::now(),
        };
        store.create_organization(&org).await.unwrap();
        let found = store.find_organization("org-1").await.unwrap().unwrap();
        assert_eq!(found.slug, "acme");
        assert_eq!(store.list_organizations().await.unwrap().len(), 1);
    }
}
