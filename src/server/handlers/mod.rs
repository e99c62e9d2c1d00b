//! HTTP request handlers.

mod analysis;
mod documents;
mod health;

pub use analysis::{doc_analyse, task_status};
pub use documents::{doc_delete, get_text, upload_doc, upload_doc_swagger, ALLOWED_UPLOAD_TYPES};
pub use health::{health, root};
