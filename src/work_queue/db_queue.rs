//! Durable task queue stored in the `analysis_tasks` table.
//!
//! The API process inserts `pending` rows; worker processes claim the oldest
//! pending row inside a transaction, moving it to `running`.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use super::{failure_payload, AsyncJobSubmitter, ClaimedJob, JobConsumer, QueueError};
use crate::models::{AnalysisJob, TaskId, TaskState, TaskStatus};
use crate::repository::diesel_models::{AnalysisTaskRecord, NewAnalysisTask};
use crate::repository::pool::DbPool;
use crate::schema::analysis_tasks;
use crate::with_conn;

impl From<AnalysisTaskRecord> for TaskStatus {
    fn from(record: AnalysisTaskRecord) -> Self {
        TaskStatus {
            task_id: record.id,
            status: TaskState::from_str(&record.status).unwrap_or(TaskState::Failed),
            result: record
                .result
                .and_then(|r| serde_json::from_str(&r).ok()),
        }
    }
}

/// Task queue backed by the database.
#[derive(Clone)]
pub struct DieselTaskQueue {
    pool: DbPool,
}

impl DieselTaskQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Count tasks currently in a given state.
    pub async fn count_in_state(&self, state: TaskState) -> Result<u64, QueueError> {
        use diesel::dsl::count_star;

        let count: i64 = with_conn!(self.pool, conn => {
            analysis_tasks::table
                .filter(analysis_tasks::status.eq(state.as_str()))
                .select(count_star())
                .first(&mut conn)
                .await
        })?;
        Ok(count as u64)
    }

    async fn finish(
        &self,
        handle: ClaimedJob,
        state: TaskState,
        payload: serde_json::Value,
    ) -> Result<(), QueueError> {
        let (task_id, _) = handle.consume();
        let payload = serde_json::to_string(&payload)?;
        let now = Utc::now().to_rfc3339();

        let rows = with_conn!(self.pool, conn => {
            diesel::update(analysis_tasks::table.find(&task_id))
                .set((
                    analysis_tasks::status.eq(state.as_str()),
                    analysis_tasks::result.eq(Some(&payload)),
                    analysis_tasks::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await
        })?;

        if rows == 0 {
            return Err(QueueError::NotFound(task_id));
        }
        Ok(())
    }
}

#[async_trait]
impl AsyncJobSubmitter for DieselTaskQueue {
    async fn submit(&self, job: AnalysisJob) -> Result<TaskId, QueueError> {
        let task_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let new_task = NewAnalysisTask {
            id: &task_id,
            document_id: job.document_id,
            status: TaskState::Pending.as_str(),
            created_at: &now,
            updated_at: &now,
        };

        with_conn!(self.pool, conn => {
            diesel::insert_into(analysis_tasks::table)
                .values(&new_task)
                .execute(&mut conn)
                .await
        })?;

        tracing::debug!("Queued task {} for document {}", task_id, job.document_id);
        Ok(task_id)
    }

    async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>, QueueError> {
        let record: Option<AnalysisTaskRecord> = with_conn!(self.pool, conn => {
            analysis_tasks::table
                .find(task_id)
                .select(AnalysisTaskRecord::as_select())
                .first(&mut conn)
                .await
                .optional()
        })?;
        Ok(record.map(TaskStatus::from))
    }
}

#[async_trait]
impl JobConsumer for DieselTaskQueue {
    async fn claim_next(&self, worker: &str) -> Result<Option<ClaimedJob>, QueueError> {
        // Read and guarded update run as separate autocommit statements.
        // Each waits out busy_timeout on its own; a read-then-write
        // transaction would fail with "database is locked" when two
        // SQLite connections try to upgrade at once.
        loop {
            let oldest: Option<(String, i64)> = with_conn!(self.pool, conn => {
                analysis_tasks::table
                    .filter(analysis_tasks::status.eq(TaskState::Pending.as_str()))
                    .order((analysis_tasks::created_at.asc(), analysis_tasks::id.asc()))
                    .select((analysis_tasks::id, analysis_tasks::document_id))
                    .first(&mut conn)
                    .await
                    .optional()
            })?;

            let Some((task_id, document_id)) = oldest else {
                return Ok(None);
            };

            let now = Utc::now().to_rfc3339();
            let rows = with_conn!(self.pool, conn => {
                diesel::update(
                    analysis_tasks::table
                        .find(&task_id)
                        .filter(analysis_tasks::status.eq(TaskState::Pending.as_str())),
                )
                .set((
                    analysis_tasks::status.eq(TaskState::Running.as_str()),
                    analysis_tasks::worker.eq(Some(worker)),
                    analysis_tasks::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await
            })?;

            if rows == 1 {
                return Ok(Some(ClaimedJob::new(task_id, AnalysisJob { document_id })));
            }
            // Another worker claimed it first; try the next one.
            tracing::debug!("Task {} was claimed concurrently, retrying", task_id);
        }
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
    use crate::repository::DbContext;
    use tempfile::{tempdir, TempDir};

    async fn setup_queue() -> (DieselTaskQueue, TempDir) {
        let dir = tempdir().unwrap();
        let ctx = DbContext::from_sqlite_path(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        (ctx.tasks(), dir)
    }

    #[tokio::test]
    async fn test_submit_then_status_pending() {
        let (queue, _dir) = setup_queue().await;

        let task_id = queue.submit(AnalysisJob { document_id: 3 }).await.unwrap();
        let status = queue.status(&task_id).await.unwrap().unwrap();

        assert_eq!(status.task_id, task_id);
        assert_eq!(status.status, TaskState::Pending);
        assert!(status.result.is_none());
        assert!(queue.status("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_order_and_exclusivity() {
        let (queue, _dir) = setup_queue().await;

        let first = queue.submit(AnalysisJob { document_id: 1 }).await.unwrap();
        let second = queue.submit(AnalysisJob { document_id: 2 }).await.unwrap();

        let a = queue.claim_next("w1").await.unwrap().unwrap();
        let b = queue.claim_next("w2").await.unwrap().unwrap();
        assert!(queue.claim_next("w3").await.unwrap().is_none());

        assert_eq!(a.task_id, first);
        assert_eq!(a.job.document_id, 1);
        assert_eq!(b.task_id, second);
        assert_eq!(queue.count_in_state(TaskState::Running).await.unwrap(), 2);

        queue.complete(a, serde_json::json!({"ok": true})).await.unwrap();
        queue.fail(b, "boom").await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_and_fail_record_results() {
        let (queue, _dir) = setup_queue().await;

        let ok_id = queue.submit(AnalysisJob { document_id: 1 }).await.unwrap();
        let bad_id = queue.submit(AnalysisJob { document_id: 2 }).await.unwrap();

        let ok = queue.claim_next("w").await.unwrap().unwrap();
        queue
            .complete(ok, serde_json::json!({"status": "success", "text_length": 5}))
            .await
            .unwrap();

        let bad = queue.claim_next("w").await.unwrap().unwrap();
        queue.fail(bad, "Document with id 2 not found").await.unwrap();

        let ok_status = queue.status(&ok_id).await.unwrap().unwrap();
        assert_eq!(ok_status.status, TaskState::Success);
        assert_eq!(ok_status.result.unwrap()["text_length"], 5);

        let bad_status = queue.status(&bad_id).await.unwrap().unwrap();
        assert_eq!(bad_status.status, TaskState::Failed);
        assert_eq!(
            bad_status.result.unwrap()["error"],
            "Document with id 2 not found"
        );

        // Failed jobs are not requeued.
        assert!(queue.claim_next("w").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_never_fail_or_overlap() {
        let (queue, _dir) = setup_queue().await;

        let mut submitted = std::collections::HashSet::new();
        for i in 0..40 {
            submitted.insert(queue.submit(AnalysisJob { document_id: i }).await.unwrap());
        }

        let mut claimers = tokio::task::JoinSet::new();
        for w in 0..8 {
            let queue = queue.clone();
            claimers.spawn(async move {
                let mut claimed = Vec::new();
                let mut errors = Vec::new();
                for _ in 0..10 {
                    match queue.claim_next(&format!("w{}", w)).await {
                        Ok(Some(handle)) => {
                            claimed.push(handle.task_id.clone());
                            if let Err(e) = queue.complete(handle, serde_json::json!({})).await {
                                errors.push(e.to_string());
                            }
                        }
                        Ok(None) => {}
                        Err(e) => errors.push(e.to_string()),
                    }
                }
                (claimed, errors)
            });
        }

        let mut all_claimed = Vec::new();
        let mut all_errors = Vec::new();
        while let Some(joined) = claimers.join_next().await {
            let (claimed, errors) = joined.unwrap();
            all_claimed.extend(claimed);
            all_errors.extend(errors);
        }

        assert!(all_errors.is_empty(), "queue errors: {:?}", all_errors);
        let unique: std::collections::HashSet<_> = all_claimed.iter().cloned().collect();
        assert_eq!(unique.len(), all_claimed.len(), "a task was claimed twice");
        // 80 attempts over 40 tasks: every task is claimed exactly once.
        assert_eq!(unique, submitted);
        assert_eq!(queue.count_in_state(TaskState::Success).await.unwrap(), 40);
        assert_eq!(queue.count_in_state(TaskState::Pending).await.unwrap(), 0);
    }
}
