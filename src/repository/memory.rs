//! In-memory `DocumentStore` for tests and embedded use.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::util::to_diesel_error;
use super::{remove_backing_file, DocumentStore, StoreError};
use crate::models::{DeleteOutcome, Document, DocumentId, DocumentText};

#[derive(Debug, Default)]
struct Tables {
    documents: BTreeMap<DocumentId, Document>,
    texts: BTreeMap<i64, DocumentText>,
    next_document_id: DocumentId,
    next_text_id: i64,
}

/// Document store backed by in-process maps.
///
/// Mirrors the Diesel store's constraints: unique file paths, text rows must
/// reference an existing document, and deletes remove text rows with the
/// document.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    tables: Arc<RwLock<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of text rows stored for a document.
    pub async fn text_count(&self, document_id: DocumentId) -> usize {
        self.tables
            .read()
            .await
            .texts
            .values()
            .filter(|t| t.document_id == document_id)
            .count()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database(to_diesel_error(
                "connection refused",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save_document(&self, file_path: &str) -> Result<Document, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        if tables.documents.values().any(|d| d.file_path == file_path) {
            return Err(StoreError::Conflict(file_path.to_string()));
        }

        tables.next_document_id += 1;
        let doc = Document {
            id: tables.next_document_id,
            file_path: file_path.to_string(),
            upload_date: Utc::now(),
        };
        tables.documents.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        self.check_available()?;
        Ok(self.tables.read().await.documents.get(&id).cloned())
    }

    async fn save_extracted_text(
        &self,
        document_id: DocumentId,
        text: &str,
    ) -> Result<DocumentText, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        if !tables.documents.contains_key(&document_id) {
            return Err(StoreError::Database(to_diesel_error(
                "FOREIGN KEY constraint failed",
            )));
        }

        tables.next_text_id += 1;
        let row = DocumentText {
            id: tables.next_text_id,
            document_id,
            extracted_text: text.to_string(),
        };
        tables.texts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_text_by_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Option<DocumentText>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .await
            .texts
            .values()
            .rev()
            .find(|t| t.document_id == document_id)
            .cloned())
    }

    async fn delete_document(&self, id: DocumentId) -> Result<DeleteOutcome, StoreError> {
        self.check_available()?;

        let removed = {
            let mut tables = self.tables.write().await;
            let removed = tables.documents.remove(&id);
            if removed.is_some() {
                tables.texts.retain(|_, t| t.document_id != id);
            }
            removed
        };

        match removed {
            Some(doc) => Ok(remove_backing_file(Path::new(&doc.file_path)).await),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = MemoryDocumentStore::new();
        let a = store.save_document("/a").await.unwrap();
        let b = store.save_document("/b").await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
    }

    #[tokio::test]
    async fn test_constraints_match_database() {
        let store = MemoryDocumentStore::new();
        store.save_document("/a").await.unwrap();

        assert!(matches!(
            store.save_document("/a").await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.save_extracted_text(99, "x").await,
            Err(StoreError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_latest_text_wins() {
        let store = MemoryDocumentStore::new();
        let doc = store.save_document("/a").await.unwrap();
        store.save_extracted_text(doc.id, "old").await.unwrap();
        store.save_extracted_text(doc.id, "new").await.unwrap();

        let text = store.get_text_by_document(doc.id).await.unwrap().unwrap();
        assert_eq!(text.extracted_text, "new");
        assert_eq!(store.text_count(doc.id).await, 2);
    }

    #[tokio::test]
    async fn test_delete_cascades_texts() {
        let store = MemoryDocumentStore::new();
        let doc = store.save_document("/nonexistent/a.png").await.unwrap();
        store.save_extracted_text(doc.id, "x").await.unwrap();

        assert_eq!(
            store.delete_document(doc.id).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(store.text_count(doc.id).await, 0);
        assert_eq!(
            store.delete_document(doc.id).await.unwrap(),
            DeleteOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryDocumentStore::new();
        store.set_unavailable(true);
        assert!(store.ping().await.is_err());
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }
}
