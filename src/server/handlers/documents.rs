//! Document upload, text retrieval and deletion endpoints.

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::super::error::ApiError;
use super::super::AppState;
use crate::error::AppError;
use crate::models::{Document, DocumentId};

/// MIME types accepted by the multipart upload.
pub const ALLOWED_UPLOAD_TYPES: &[&str] = &["image/jpeg", "image/png", "application/pdf"];

/// Form fields of the base64 upload.
///
/// Accepted either urlencoded or as text fields of a multipart body.
#[derive(Debug, Deserialize)]
pub struct UploadForm {
    pub file_name: String,
    pub file_content: String,
}

#[async_trait]
impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(form) = Form::<UploadForm>::from_request(req, state)
                .await
                .map_err(|r| ApiError::new(r.status(), r.body_text()))?;
            return Ok(form);
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|r| ApiError::new(r.status(), r.body_text()))?;
        let mut file_name = None;
        let mut file_content = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let slot = match name.as_str() {
                "file_name" => &mut file_name,
                "file_content" => &mut file_content,
                _ => continue,
            };
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            *slot = Some(text);
        }

        match (file_name, file_content) {
            (Some(file_name), Some(file_content)) => Ok(Self {
                file_name,
                file_content,
            }),
            _ => Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Missing 'file_name' or 'file_content' field",
            )),
        }
    }
}

/// Response of the multipart upload.
#[derive(Debug, Serialize)]
pub struct SwaggerUploadResponse {
    pub message: &'static str,
    pub document_id: DocumentId,
    pub file_path: String,
    pub upload_date: DateTime<Utc>,
}

/// Upload a document sent as base64 form fields.
pub async fn upload_doc(
    State(state): State<AppState>,
    form: UploadForm,
) -> Result<Json<Document>, ApiError> {
    state
        .lifecycle
        .upload(&form.file_name, &form.file_content)
        .await
        .map(Json)
        .map_err(|e| ApiError::from(e).context("Error uploading document"))
}

/// Upload a document as a multipart `file` field, streamed to disk.
pub async fn upload_doc_swagger(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SwaggerUploadResponse>), ApiError> {
    let upload_error = |e: AppError| ApiError::from(e).context("Error uploading document");

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| {
                upload_error(AppError::InvalidPayload(format!(
                    "Failed to read multipart field: {}",
                    e
                )))
            })?
            .ok_or_else(|| {
                upload_error(AppError::InvalidPayload("Missing 'file' field".to_string()))
            })?;

        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ALLOWED_UPLOAD_TYPES.contains(&content_type.as_str()) {
            return Err(upload_error(AppError::UnsupportedMediaType {
                content_type,
                allowed: ALLOWED_UPLOAD_TYPES,
            }));
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let doc = state
            .lifecycle
            .upload_stream(&file_name, field)
            .await
            .map_err(upload_error)?;

        return Ok((
            StatusCode::CREATED,
            Json(SwaggerUploadResponse {
                message: "File uploaded successfully",
                document_id: doc.id,
                file_path: doc.file_path,
                upload_date: doc.upload_date,
            }),
        ));
    }
}

/// Delete a document, its text and its file.
pub async fn doc_delete(
    State(state): State<AppState>,
    Path(document_id): Path<DocumentId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state.lifecycle.delete(document_id).await.map_err(ApiError::from)?;

    if !outcome.is_deleted() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!(
                "Document with id {} not found or could not be deleted",
                document_id
            ),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Document deleted successfully",
        "document_id": document_id,
    })))
}

/// Most recent extracted text of a document.
///
/// Missing text gets its own 404 body instead of the generic `detail` one.
pub async fn get_text(
    State(state): State<AppState>,
    Path(document_id): Path<DocumentId>,
) -> Response {
    match state.lifecycle.get_text(document_id).await {
        Ok(text) => Json(json!({
            "document_id": text.document_id,
            "extracted_text": text.extracted_text,
            "status": "success",
        }))
        .into_response(),
        Err(AppError::NotFound(message)) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "document_id": document_id,
                "status": "error",
                "message": message,
            })),
        )
            .into_response(),
        Err(e) => ApiError::from(e)
            .context("Error retrieving document text")
            .into_response(),
    }
}
