//! Data models for docsift.

mod document;
mod service_status;
mod task;

pub use document::{DeleteOutcome, Document, DocumentId, DocumentText};
pub use service_status::{HealthReport, HealthStatus, OverallStatus, ServiceState};
pub use task::{AnalysisJob, TaskId, TaskState, TaskStatus};
