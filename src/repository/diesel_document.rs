//! Diesel-based document repository.
//!
//! Works against SQLite (via SyncConnectionWrapper) and PostgreSQL.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::diesel_models::{DocumentRecord, DocumentTextRecord, NewDocument, NewDocumentText};
use super::pool::DbPool;
use super::util::is_unique_violation;
use super::{parse_datetime, remove_backing_file, DocumentStore, StoreError};
use crate::models::{DeleteOutcome, Document, DocumentId, DocumentText};
use crate::schema::{document_text, documents};
use crate::with_conn;

/// Convert a database record to a domain model.
impl From<DocumentRecord> for Document {
    fn from(record: DocumentRecord) -> Self {
        Document {
            id: record.id,
            file_path: record.file_path,
            upload_date: parse_datetime(&record.upload_date),
        }
    }
}

impl From<DocumentTextRecord> for DocumentText {
    fn from(record: DocumentTextRecord) -> Self {
        DocumentText {
            id: record.id,
            document_id: record.document_id,
            extracted_text: record.extracted_text,
        }
    }
}

/// Diesel-based document repository with compile-time query checking.
#[derive(Clone)]
pub struct DieselDocumentRepository {
    pool: DbPool,
}

impl DieselDocumentRepository {
    /// Create a new Diesel document repository with an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Count extracted-text rows stored for a document.
    pub async fn count_texts(&self, document_id: DocumentId) -> Result<u64, StoreError> {
        use diesel::dsl::count_star;

        let count: i64 = with_conn!(self.pool, conn => {
            document_text::table
                .filter(document_text::document_id.eq(document_id))
                .select(count_star())
                .first(&mut conn)
                .await
        })?;
        Ok(count as u64)
    }
}

#[async_trait]
impl DocumentStore for DieselDocumentRepository {
    async fn save_document(&self, file_path: &str) -> Result<Document, StoreError> {
        let new_doc = NewDocument { file_path };

        let result: Result<DocumentRecord, diesel::result::Error> = with_conn!(self.pool, conn => {
            diesel::insert_into(documents::table)
                .values(&new_doc)
                .returning(DocumentRecord::as_returning())
                .get_result(&mut conn)
                .await
        });

        match result {
            Ok(record) => {
                tracing::debug!("Saved document {} at {}", record.id, record.file_path);
                Ok(Document::from(record))
            }
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(file_path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let record: Option<DocumentRecord> = with_conn!(self.pool, conn => {
            documents::table
                .find(id)
                .select(DocumentRecord::as_select())
                .first(&mut conn)
                .await
                .optional()
        })?;
        Ok(record.map(Document::from))
    }

    async fn save_extracted_text(
        &self,
        document_id: DocumentId,
        text: &str,
    ) -> Result<DocumentText, StoreError> {
        let new_text = NewDocumentText {
            document_id,
            extracted_text: text,
        };

        let record: DocumentTextRecord = with_conn!(self.pool, conn => {
            diesel::insert_into(document_text::table)
                .values(&new_text)
                .returning(DocumentTextRecord::as_returning())
                .get_result(&mut conn)
                .await
        })?;

        tracing::debug!(
            "Saved {} bytes of text for document {} (row {})",
            text.len(),
            document_id,
            record.id
        );
        Ok(DocumentText::from(record))
    }

    async fn get_text_by_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Option<DocumentText>, StoreError> {
        let record: Option<DocumentTextRecord> = with_conn!(self.pool, conn => {
            document_text::table
                .filter(document_text::document_id.eq(document_id))
                .order(document_text::id.desc())
                .select(DocumentTextRecord::as_select())
                .first(&mut conn)
                .await
                .optional()
        })?;
        Ok(record.map(DocumentText::from))
    }

    async fn delete_document(&self, id: DocumentId) -> Result<DeleteOutcome, StoreError> {
        let deleted_path: Option<String> = with_conn!(self.pool, conn => {
            conn.transaction(|conn| {
                Box::pin(async move {
                    let record: Option<DocumentRecord> = documents::table
                        .find(id)
                        .select(DocumentRecord::as_select())
                        .first(conn)
                        .await
                        .optional()?;

                    let Some(record) = record else {
                        return Ok::<_, diesel::result::Error>(None);
                    };

                    diesel::delete(document_text::table.filter(document_text::document_id.eq(id)))
                        .execute(conn)
                        .await?;
                    diesel::delete(documents::table.find(id))
                        .execute(conn)
                        .await?;

                    Ok(Some(record.file_path))
                })
            })
            .await
        })?;

        match deleted_path {
            Some(path) => {
                tracing::info!("Deleted document {} rows", id);
                Ok(remove_backing_file(std::path::Path::new(&path)).await)
            }
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        with_conn!(self.pool, conn => {
            diesel::sql_query("SELECT 1").execute(&mut conn).await
        })?;
        Ok(())
    }
}
