//! Error translation for the HTTP layer.
//!
//! Every use-case error reaches the client through `ApiError`, which holds
//! the one table from error kind to status code.

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::AppError;

/// An error ready to be rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Prefix the detail of server-side failures with what was being done.
    ///
    /// Client errors keep their message as is.
    pub fn context(mut self, what: &str) -> Self {
        if self.status.is_server_error() {
            self.detail = format!("{}: {}", what, self.detail);
        }
        self
    }
}

/// Status code for each use-case error kind.
pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        // Duplicate paths surface as server errors for now.
        AppError::Conflict(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::InvalidPayload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::Storage(_) | AppError::Queue(_) | AppError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

/// Last-resort handler for panics inside a request.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "message": "Internal server error",
            "detail": detail,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StoreError;

    #[test]
    fn test_status_table() {
        assert_eq!(
            status_for(&AppError::document_not_found()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AppError::UnsupportedMediaType {
                content_type: "text/plain".into(),
                allowed: &["image/png"],
            }),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status_for(&AppError::Conflict("/x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&AppError::from(StoreError::Database(
                diesel::result::Error::BrokenTransactionManager
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_context_only_on_server_errors() {
        let not_found = ApiError::from(AppError::document_not_found()).context("Error starting analysis");
        assert_eq!(not_found.detail, "Document not found");

        let failed = ApiError::from(AppError::InvalidPayload("bad".into()))
            .context("Error uploading document");
        assert_eq!(failed.detail, "Error uploading document: bad");
    }

    #[tokio::test]
    async fn test_panic_message() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "Internal server error", "detail": "boom"})
        );
    }
}
