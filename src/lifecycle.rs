//! Document lifecycle: upload, text retrieval and deletion.
//!
//! The lifecycle owns the uploaded file on disk; the `DocumentStore` owns the
//! rows. Uploaded files are named `<YYYYMMDD_HHMMSS>_<original name>` inside
//! the upload directory. Two uploads of the same name within one second
//! collide; the second fails with a conflict and leaves the first file alone.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use chrono::Local;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{AppError, Result};
use crate::models::{DeleteOutcome, Document, DocumentId, DocumentText};
use crate::repository::DocumentStore;

/// Orchestrates the file and row lifecycle of uploaded documents.
#[derive(Clone)]
pub struct DocumentLifecycle {
    store: Arc<dyn DocumentStore>,
    upload_dir: PathBuf,
}

impl DocumentLifecycle {
    pub fn new(store: Arc<dyn DocumentStore>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            upload_dir: upload_dir.into(),
        }
    }

    /// Decode a base64 payload, write it to the upload directory and record it.
    pub async fn upload(&self, file_name: &str, base64_content: &str) -> Result<Document> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(base64_content.trim())
            .map_err(|e| AppError::InvalidPayload(format!("Invalid base64 content: {}", e)))?;

        let (path, file) = self.create_target(file_name).await?;
        let chunks = futures::stream::iter([Ok::<_, Infallible>(bytes)]);
        let written = write_or_discard(&path, file, chunks).await?;

        self.record(path, written).await
    }

    /// Copy a byte stream to the upload directory chunk by chunk and record it.
    ///
    /// MIME validation is the caller's job.
    pub async fn upload_stream<S, B, E>(&self, file_name: &str, stream: S) -> Result<Document>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let (path, file) = self.create_target(file_name).await?;
        let written = write_or_discard(&path, file, stream).await?;

        self.record(path, written).await
    }

    /// Most recent extracted text for a document. Absent text is an error.
    pub async fn get_text(&self, document_id: DocumentId) -> Result<DocumentText> {
        self.store
            .get_text_by_document(document_id)
            .await?
            .ok_or_else(|| AppError::text_not_found(document_id))
    }

    /// Delete the document rows and its file.
    pub async fn delete(&self, document_id: DocumentId) -> Result<DeleteOutcome> {
        let outcome = self.store.delete_document(document_id).await?;
        match &outcome {
            DeleteOutcome::Deleted => tracing::info!("Deleted document {}", document_id),
            DeleteOutcome::NotFound => {
                tracing::debug!("Delete of unknown document {}", document_id)
            }
            DeleteOutcome::FileRemovalFailed { path, error } => tracing::warn!(
                "Document {} deleted but {} remains: {}",
                document_id,
                path.display(),
                error
            ),
        }
        Ok(outcome)
    }

    /// Create the upload directory if needed and open a fresh target file.
    ///
    /// Never overwrites: an existing file at the chosen path is a conflict.
    async fn create_target(&self, file_name: &str) -> Result<(PathBuf, tokio::fs::File)> {
        let name = unique_file_name(file_name)?;
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.upload_dir.join(name);

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    AppError::Conflict(path.display().to_string())
                }
                _ => AppError::Io(e),
            })?;
        Ok((path, file))
    }

    /// Insert the row for a written file. The file is removed if the insert fails.
    async fn record(&self, path: PathBuf, size: u64) -> Result<Document> {
        let file_path = path.display().to_string();
        match self.store.save_document(&file_path).await {
            Ok(doc) => {
                tracing::info!("Uploaded document {} ({} bytes) to {}", doc.id, size, file_path);
                Ok(doc)
            }
            Err(e) => {
                discard(&path).await;
                Err(e.into())
            }
        }
    }
}

/// Timestamp-prefixed name for an upload, keeping only the final path component.
pub fn unique_file_name(original: &str) -> Result<String> {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::InvalidPayload(format!("Invalid file name: {:?}", original)))?;

    Ok(format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), name))
}

/// Copy `chunks` into `writer`. Any failure, including the final flush,
/// removes the partially written file at `path`.
async fn write_or_discard<W, S, B, E>(path: &Path, mut writer: W, chunks: S) -> Result<u64>
where
    W: AsyncWrite + Unpin,
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let result = copy_chunks(&mut writer, chunks).await;
    drop(writer);
    if result.is_err() {
        discard(path).await;
    }
    result
}

async fn copy_chunks<W, S, B, E>(writer: &mut W, chunks: S) -> Result<u64>
where
    W: AsyncWrite + Unpin,
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut written: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        let chunk =
            chunk.map_err(|e| AppError::InvalidPayload(format!("Upload interrupted: {}", e)))?;
        let chunk = chunk.as_ref();
        writer.write_all(chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Failed to clean up {}: {}", path.display(), e);
    }
}
