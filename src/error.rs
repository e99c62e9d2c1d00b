//! Use-case level error taxonomy.
//!
//! The HTTP layer turns each variant into a status code in one place
//! (`server::error`).

use thiserror::Error;

use crate::models::DocumentId;
use crate::repository::StoreError;
use crate::work_queue::QueueError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Document or extracted text absent.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate `file_path` on save.
    #[error("Document file path already exists: {0}")]
    Conflict(String),

    /// Upload MIME type outside the allow-list.
    #[error("Unsupported file type. Allowed types: {}", .allowed.join(", "))]
    UnsupportedMediaType {
        content_type: String,
        allowed: &'static [&'static str],
    },

    /// Malformed request content: bad base64, missing multipart field.
    #[error("{0}")]
    InvalidPayload(String),

    #[error("Storage error: {0}")]
    Storage(StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn document_not_found() -> Self {
        Self::NotFound("Document not found".to_string())
    }

    pub fn text_not_found(document_id: DocumentId) -> Self {
        Self::NotFound(format!("Text not found for document {}", document_id))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(path) => Self::Conflict(path),
            other => Self::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
