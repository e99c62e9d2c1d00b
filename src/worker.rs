//! Background OCR worker.
//!
//! `AnalysisWorker` runs one job: it re-reads the document, checks the file,
//! runs OCR and appends the text. `WorkerPool` drives N slots that poll the
//! job queue until shut down.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::models::DocumentId;
use crate::ocr::{OcrError, TextExtractor};
use crate::repository::{DocumentStore, StoreError};
use crate::work_queue::{JobConsumer, QueueError};

/// Why an analysis job failed. Recorded on the task, never retried.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Document with id {0} not found")]
    DocumentNotFound(DocumentId),

    #[error("File not found at {0}")]
    FileMissing(String),

    #[error("{0}")]
    Ocr(#[from] OcrError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Result payload of a successful job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisOutcome {
    pub status: &'static str,
    pub document_id: DocumentId,
    /// Length of the extracted text in characters.
    pub text_length: usize,
}

/// Runs OCR for one document and stores the text.
#[derive(Clone)]
pub struct AnalysisWorker {
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn TextExtractor>,
}

impl AnalysisWorker {
    pub fn new(store: Arc<dyn DocumentStore>, extractor: Arc<dyn TextExtractor>) -> Self {
        Self { store, extractor }
    }

    pub async fn process(&self, document_id: DocumentId) -> Result<AnalysisOutcome, WorkerError> {
        let document = self
            .store
            .get_document(document_id)
            .await?
            .ok_or(WorkerError::DocumentNotFound(document_id))?;

        let path = document.path().to_path_buf();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(WorkerError::FileMissing(document.file_path));
        }

        let extractor = self.extractor.clone();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| OcrError::OcrFailed(format!("OCR task aborted: {}", e)))??;

        // Nothing is written unless OCR produced text.
        self.store.save_extracted_text(document_id, &text).await?;

        Ok(AnalysisOutcome {
            status: "success",
            document_id,
            text_length: text.chars().count(),
        })
    }
}

/// Pool of worker slots consuming the job queue.
#[derive(Clone)]
pub struct WorkerPool {
    worker: AnalysisWorker,
    queue: Arc<dyn JobConsumer>,
    slots: usize,
    poll_interval: Duration,
    name: String,
}

impl WorkerPool {
    pub fn new(worker: AnalysisWorker, queue: Arc<dyn JobConsumer>) -> Self {
        Self {
            worker,
            queue,
            slots: 1,
            poll_interval: Duration::from_secs(1),
            name: default_worker_name(),
        }
    }

    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Claim and run at most one job. Returns whether a job was handled.
    pub async fn run_once(&self, slot_name: &str) -> Result<bool, QueueError> {
        let Some(claimed) = self.queue.claim_next(slot_name).await? else {
            return Ok(false);
        };

        let document_id = claimed.job.document_id;
        tracing::info!(
            "{} started task {} for document {}",
            slot_name,
            claimed.task_id,
            document_id
        );

        match self.worker.process(document_id).await {
            Ok(outcome) => {
                tracing::info!(
                    "Task {} finished: {} characters extracted",
                    claimed.task_id,
                    outcome.text_length
                );
                let result = serde_json::to_value(&outcome)?;
                self.queue.complete(claimed, result).await?;
            }
            Err(e) => {
                tracing::error!("Task {} failed: {}", claimed.task_id, e);
                self.queue.fail(claimed, &e.to_string()).await?;
            }
        }
        Ok(true)
    }

    /// Run every slot until `shutdown` turns true or its sender goes away.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut slots = JoinSet::new();
        for i in 0..self.slots {
            let pool = self.clone();
            let shutdown = shutdown.clone();
            let slot_name = format!("{}-{}", self.name, i);
            slots.spawn(async move { pool.run_slot(slot_name, shutdown).await });
        }

        tracing::info!("Worker {} running with {} slots", self.name, self.slots);
        while let Some(joined) = slots.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker slot panicked: {}", e);
            }
        }
        tracing::info!("Worker {} stopped", self.name);
    }

    async fn run_slot(&self, slot_name: String, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_once(&slot_name).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => tracing::error!("{}: queue error: {}", slot_name, e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

/// `<hostname>-<pid>`, recorded on claimed tasks.
fn default_worker_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "worker".to_string());
    format!("{}-{}", host, std::process::id())
}
