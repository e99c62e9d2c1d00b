//! Router configuration for the web server.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::error::handle_panic;
use super::handlers;
use super::AppState;

/// Prefix of the JSON API.
pub const API_PREFIX: &str = "/api/v1";

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/upload_doc", post(handlers::upload_doc))
        .route("/upload_doc_swagger", post(handlers::upload_doc_swagger))
        .route("/doc_delete/:document_id", delete(handlers::doc_delete))
        .route("/doc_analyse/:document_id", post(handlers::doc_analyse))
        .route("/get_text/:document_id", get(handlers::get_text))
        .route("/task_status/:task_id", get(handlers::task_status))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    let documents = ServeDir::new(&state.documents_dir);

    Router::new()
        .route("/", get(handlers::root))
        .nest(API_PREFIX, api)
        // Uploaded files, under the same names they were stored with
        .nest_service("/documents", documents)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
