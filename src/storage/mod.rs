//! Record persistence
//!
//! The relational side of the archive: Document, Assertion, and
//! Organization rows behind the `RecordStore` trait. The pipeline only
//! reads and upserts documents and inserts assertions; assertion rows are
//! immutable once written.

mod records;
mod sqlite;
mod traits;

pub use records::{Assertion, Document, DocumentUpdate, NewDocument, Organization};
pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StoreError, StoreResult};
