//! Analysis task models shared by the dispatcher, the queue and the worker.

use serde::{Deserialize, Serialize};

use super::DocumentId;

/// Opaque handle returned when a job is submitted.
pub type TaskId = String;

/// A request to run OCR on one document.
///
/// Only the id travels through the queue; the worker re-reads the document
/// when it picks the job up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub document_id: DocumentId,
}

/// Lifecycle state of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Success,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether the task will not change state again.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Status lookup result for a task handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub status: TaskState,
    /// Worker result on success, `{"error": ..}` on failure, null otherwise.
    pub result: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_roundtrip() {
        for state in [
            TaskState::Pending,
            TaskState::Running,
            TaskState::Success,
            TaskState::Failed,
        ] {
            assert_eq!(TaskState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(TaskState::from_str("STARTED"), None);
    }

    #[test]
    fn test_finished_states() {
        assert!(!TaskState::Pending.is_finished());
        assert!(!TaskState::Running.is_finished());
        assert!(TaskState::Success.is_finished());
        assert!(TaskState::Failed.is_finished());
    }
}
