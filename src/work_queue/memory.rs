//! In-process task queue.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{failure_payload, AsyncJobSubmitter, ClaimedJob, JobConsumer, QueueError};
use crate::models::{AnalysisJob, TaskId, TaskState, TaskStatus};

#[derive(Debug, Default)]
struct Inner {
    pending: VecDeque<TaskId>,
    tasks: HashMap<TaskId, (AnalysisJob, TaskStatus)>,
}

/// Task queue held in memory. Lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryTaskQueue {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to be claimed.
    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    async fn finish(
        &self,
        handle: ClaimedJob,
        state: TaskState,
        payload: serde_json::Value,
    ) -> Result<(), QueueError> {
        let (task_id, _) = handle.consume();
        let mut inner = self.inner.lock().await;
        let (_, status) = inner
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| QueueError::NotFound(task_id.clone()))?;
        status.status = state;
        status.result = Some(payload);
        Ok(())
    }
}

#[async_trait]
impl AsyncJobSubmitter for MemoryTaskQueue {
    async fn submit(&self, job: AnalysisJob) -> Result<TaskId, QueueError> {
        let task_id = Uuid::new_v4().to_string();
        let status = TaskStatus {
            task_id: task_id.clone(),
            status: TaskState::Pending,
            result: None,
        };

        let mut inner = self.inner.lock().await;
        inner.tasks.insert(task_id.clone(), (job, status));
        inner.pending.push_back(task_id.clone());
        Ok(task_id)
    }

    async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>, QueueError> {
        Ok(self
            .inner
            .lock()
            .await
            .tasks
            .get(task_id)
            .map(|(_, status)| status.clone()))
    }
}

#[async_trait]
impl JobConsumer for MemoryTaskQueue {
    async fn claim_next(&self, _worker: &str) -> Result<Option<ClaimedJob>, QueueError> {
        let mut inner = self.inner.lock().await;
        let Some(task_id) = inner.pending.pop_front() else {
            return Ok(None);
        };
        let (job, status) = inner
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| QueueError::NotFound(task_id.clone()))?;
        status.status = TaskState::Running;
        Ok(Some(ClaimedJob::new(task_id, *job)))
    }

    async fn complete(
        &self,
        handle: ClaimedJob,
        result: serde_json::Value,
    ) -> Result<(), QueueError> {
        self.finish(handle, TaskState::Success, result).await
    }

    async fn fail(&self, handle: ClaimedJob, error: &str) -> Result<(), QueueError> {
        self.finish(handle, TaskState::Failed, failure_payload(error))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_claim() {
        let queue = MemoryTaskQueue::new();
        let a = queue.submit(AnalysisJob { document_id: 1 }).await.unwrap();
        let b = queue.submit(AnalysisJob { document_id: 2 }).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(queue.pending_len().await, 2);

        let first = queue.claim_next("w").await.unwrap().unwrap();
        assert_eq!(first.task_id, a);
        assert_eq!(
            queue.status(&a).await.unwrap().unwrap().status,
            TaskState::Running
        );

        queue.complete(first, serde_json::json!({})).await.unwrap();
        assert_eq!(
            queue.status(&a).await.unwrap().unwrap().status,
            TaskState::Success
        );

        let second = queue.claim_next("w").await.unwrap().unwrap();
        queue.fail(second, "bad").await.unwrap();
        let status = queue.status(&b).await.unwrap().unwrap();
        assert_eq!(status.status, TaskState::Failed);
        assert_eq!(status.result.unwrap()["error"], "bad");

        assert!(queue.claim_next("w").await.unwrap().is_none());
    }
}
