//! Document models.
//!
//! A `Document` is created once per upload and never modified afterwards;
//! it only goes away through deletion, which takes its `DocumentText`
//! rows with it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage-assigned document identifier.
pub type DocumentId = i64;

/// An uploaded document and the location of its bytes on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Assigned by storage on insert.
    pub id: DocumentId,
    /// Path of the persisted file. Unique across all documents.
    pub file_path: String,
    /// Set by storage when the row is created.
    pub upload_date: DateTime<Utc>,
}

impl Document {
    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        Path::new(&self.file_path)
    }
}

/// Text extracted from a document by one OCR run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    pub id: i64,
    pub document_id: DocumentId,
    pub extracted_text: String,
}

/// Result of deleting a document.
///
/// The database rows are gone in both `Deleted` and `FileRemovalFailed`;
/// the latter only records that the backing file could not be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Rows committed as deleted and the file is gone.
    Deleted,
    /// No document with that id existed.
    NotFound,
    /// Rows committed as deleted, but removing the file failed.
    FileRemovalFailed { path: PathBuf, error: String },
}

impl DeleteOutcome {
    /// Whether the whole delete (rows and file) succeeded.
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}
