//! Repository layer for document persistence.
//!
//! `DocumentStore` is the only path that writes documents and extracted
//! text. The Diesel implementation supports SQLite and PostgreSQL; the
//! in-memory implementation backs tests.

pub mod context;
pub mod diesel_document;
pub mod diesel_models;
pub mod memory;
pub mod pool;
pub mod util;

pub use context::DbContext;
pub use diesel_document::DieselDocumentRepository;
pub use memory::MemoryDocumentStore;
pub use pool::{DbError, DbPool};

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::models::{DeleteOutcome, Document, DocumentId, DocumentText};

/// Errors from the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document with this file path already exists.
    #[error("Document file path already exists: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Persistence for documents and their extracted text.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document row. Storage assigns `id` and `upload_date`.
    async fn save_document(&self, file_path: &str) -> Result<Document, StoreError>;

    /// Look up a document by id.
    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    /// Append an extracted-text row for a document.
    ///
    /// Does not check that the document still exists; the foreign key is the
    /// only guard.
    async fn save_extracted_text(
        &self,
        document_id: DocumentId,
        text: &str,
    ) -> Result<DocumentText, StoreError>;

    /// The most recent extracted-text row for a document.
    async fn get_text_by_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Option<DocumentText>, StoreError>;

    /// Delete all text rows and the document row in one transaction, then
    /// remove the backing file.
    ///
    /// The row deletion stays committed even if the file cannot be removed.
    async fn delete_document(&self, id: DocumentId) -> Result<DeleteOutcome, StoreError>;

    /// Lightweight round trip used by the health check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Remove a deleted document's file, folding the result into a `DeleteOutcome`.
///
/// A file that is already gone counts as removed.
pub(crate) async fn remove_backing_file(path: &Path) -> DeleteOutcome {
    match tokio::fs::remove_file(path).await {
        Ok(()) => DeleteOutcome::Deleted,
        Err(e) if e.kind() == ErrorKind::NotFound => DeleteOutcome::Deleted,
        Err(e) => {
            tracing::warn!(
                "Document rows deleted but file {} could not be removed: {}",
                path.display(),
                e
            );
            DeleteOutcome::FileRemovalFailed {
                path: path.to_path_buf(),
                error: e.to_string(),
            }
        }
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
///
/// Accepts RFC 3339 as well as SQLite's `YYYY-MM-DD HH:MM:SS` form.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use tempfile::tempdir;

    #[test]
    fn test_parse_datetime_formats() {
        let dt = parse_datetime("2024-03-05T10:11:12.345Z");
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (10, 11, 12));

        let dt = parse_datetime("2024-03-05 10:11:12");
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (10, 11, 12));

        assert_eq!(parse_datetime("garbage"), DateTime::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_remove_backing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.png");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(remove_backing_file(&path).await, DeleteOutcome::Deleted);
        assert!(!path.exists());

        // Already gone is still a successful removal.
        assert_eq!(remove_backing_file(&path).await, DeleteOutcome::Deleted);
    }

    #[tokio::test]
    async fn test_remove_backing_file_failure() {
        let dir = tempdir().unwrap();
        // A non-empty directory cannot be removed with remove_file.
        let path = dir.path().join("not-a-file");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("inner"), b"x").unwrap();

        match remove_backing_file(&path).await {
            DeleteOutcome::FileRemovalFailed { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("expected FileRemovalFailed, got {:?}", other),
        }
    }
}
