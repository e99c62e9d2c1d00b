//! Claimed job handle.

use crate::models::{AnalysisJob, TaskId};

/// A claimed job. Move semantics: consumed by `complete()` or `fail()`.
///
/// If dropped without being consumed, logs a warning. The task row stays in
/// `running` and has to be inspected by hand.
#[derive(Debug)]
pub struct ClaimedJob {
    pub task_id: TaskId,
    pub job: AnalysisJob,
    consumed: bool,
}

impl ClaimedJob {
    pub(crate) fn new(task_id: TaskId, job: AnalysisJob) -> Self {
        Self {
            task_id,
            job,
            consumed: false,
        }
    }

    /// Mark this handle as consumed (called internally by complete/fail).
    pub(crate) fn consume(mut self) -> (TaskId, AnalysisJob) {
        self.consumed = true;
        (std::mem::take(&mut self.task_id), self.job)
    }
}

impl Drop for ClaimedJob {
    fn drop(&mut self) {
        if !self.consumed {
            tracing::warn!(
                "Claimed job {} dropped without being completed or failed",
                self.task_id
            );
        }
    }
}
