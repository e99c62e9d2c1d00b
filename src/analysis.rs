//! Analysis dispatch: check the document exists, then queue OCR for it.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{AnalysisJob, DocumentId, TaskId, TaskStatus};
use crate::repository::DocumentStore;
use crate::work_queue::AsyncJobSubmitter;

/// Hands analysis requests to the job queue without waiting on them.
#[derive(Clone)]
pub struct AnalysisDispatcher {
    store: Arc<dyn DocumentStore>,
    submitter: Arc<dyn AsyncJobSubmitter>,
}

impl AnalysisDispatcher {
    pub fn new(store: Arc<dyn DocumentStore>, submitter: Arc<dyn AsyncJobSubmitter>) -> Self {
        Self { store, submitter }
    }

    /// Queue OCR for an existing document and return the task handle.
    ///
    /// Nothing is queued when the document does not exist. Only the id is
    /// queued; the worker reads the document again when it runs.
    pub async fn analyze(&self, document_id: DocumentId) -> Result<TaskId> {
        if self.store.get_document(document_id).await?.is_none() {
            return Err(AppError::document_not_found());
        }

        let task_id = self.submitter.submit(AnalysisJob { document_id }).await?;
        tracing::info!("Analysis of document {} queued as {}", document_id, task_id);
        Ok(task_id)
    }

    /// Status of a queued analysis.
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        self.submitter
            .status(task_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskState;
    use crate::work_queue::MemoryTaskQueue;

    fn dispatcher() -> (AnalysisDispatcher, Arc<dyn DocumentStore>, MemoryTaskQueue) {
        let store: Arc<dyn DocumentStore> = Arc::new(crate::repository::MemoryDocumentStore::new());
        let queue = MemoryTaskQueue::new();
        (
            AnalysisDispatcher::new(store.clone(), Arc::new(queue.clone())),
            store,
            queue,
        )
    }

    #[tokio::test]
    async fn test_analyze_missing_document_submits_nothing() {
        let (dispatcher, _, queue) = dispatcher();

        let err = dispatcher.analyze(42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Document not found"));
        assert_eq!(queue.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_analyze_queues_job() {
        let (dispatcher, store, queue) = dispatcher();
        let doc = store.save_document("/tmp/docs/a.png").await.unwrap();

        let task_id = dispatcher.analyze(doc.id).await.unwrap();
        assert_eq!(queue.pending_len().await, 1);

        let status = dispatcher.task_status(&task_id).await.unwrap();
        assert_eq!(status.status, TaskState::Pending);
        assert!(store.get_document(doc.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_analysis_allowed() {
        let (dispatcher, store, queue) = dispatcher();
        let doc = store.save_document("/tmp/docs/b.png").await.unwrap();

        let a = dispatcher.analyze(doc.id).await.unwrap();
        let b = dispatcher.analyze(doc.id).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(queue.pending_len().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_task_status() {
        let (dispatcher, _, _) = dispatcher();
        assert!(matches!(
            dispatcher.task_status("nope").await,
            Err(AppError::NotFound(_))
        ));
    }
}
