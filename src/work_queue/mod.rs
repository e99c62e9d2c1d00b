//! Job queue boundary between the API and the analysis worker.
//!
//! The API side only submits jobs and looks up their status
//! (`AsyncJobSubmitter`). The worker side claims, completes and fails them
//! (`JobConsumer`). Both sides share nothing but the queue backend:
//! - `DieselTaskQueue`: durable, rows in `analysis_tasks`, usable across processes
//! - `MemoryTaskQueue`: in-process, for tests and single-binary setups

mod db_queue;
mod error;
mod handle;
mod memory;

pub use db_queue::DieselTaskQueue;
pub use error::QueueError;
pub use handle::ClaimedJob;
pub use memory::MemoryTaskQueue;

use async_trait::async_trait;

use crate::models::{AnalysisJob, TaskId, TaskStatus};

/// Submission side of the queue.
#[async_trait]
pub trait AsyncJobSubmitter: Send + Sync {
    /// Enqueue a job and return its tracking handle. Never waits for the job.
    async fn submit(&self, job: AnalysisJob) -> Result<TaskId, QueueError>;

    /// Current status of a previously submitted job, `None` for unknown handles.
    async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>, QueueError>;
}

/// Consumption side of the queue.
///
/// A claimed job is handed out to exactly one worker and must be finished
/// with `complete()` or `fail()`.
#[async_trait]
pub trait JobConsumer: Send + Sync {
    /// Claim the oldest pending job, marking it running.
    async fn claim_next(&self, worker: &str) -> Result<Option<ClaimedJob>, QueueError>;

    /// Mark a claimed job as successful and store its result payload.
    async fn complete(
        &self,
        handle: ClaimedJob,
        result: serde_json::Value,
    ) -> Result<(), QueueError>;

    /// Mark a claimed job as failed. Failed jobs are not retried.
    async fn fail(&self, handle: ClaimedJob, error: &str) -> Result<(), QueueError>;
}

/// Result payload stored for a failed job.
pub(crate) fn failure_payload(error: &str) -> serde_json::Value {
    serde_json::json!({ "error": error })
}
