//! End-to-end document flow through the HTTP API.
//!
//! Upload, analyse, let a worker pick the job up, read the text back and
//! delete the document, all against a SQLite database in a temp directory.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tempfile::tempdir;
use tower::ServiceExt;

use docsift::config::Settings;
use docsift::ocr::FixedTextExtractor;
use docsift::repository::{DbContext, DocumentStore};
use docsift::server::{create_router, AppState};
use docsift::work_queue::{DieselTaskQueue, MemoryTaskQueue};
use docsift::worker::{AnalysisWorker, WorkerPool};

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn call(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn upload(file_name: &str, base64: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/upload_doc")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "file_name={}&file_content={}",
            file_name, base64
        )))
        .unwrap()
}

fn test_settings(dir: &std::path::Path) -> Settings {
    let mut settings = Settings::with_data_dir(dir.to_path_buf());
    settings.broker_url = "amqp://127.0.0.1:1/".to_string();
    settings.check_timeout_ms = 200;
    settings
}

#[tokio::test]
async fn test_upload_analyse_read_delete() {
    let dir = tempdir().unwrap();
    let settings = test_settings(dir.path());
    let ctx = DbContext::from_sqlite_path(&settings.database_path());
    ctx.init_schema().await.unwrap();

    let store: Arc<dyn DocumentStore> = Arc::new(ctx.documents());
    let extractor = Arc::new(FixedTextExtractor::new("HELLO"));
    let queue = MemoryTaskQueue::new();
    let app = create_router(AppState::new(
        &settings,
        store.clone(),
        Arc::new(queue.clone()),
        extractor.clone(),
    ));
    let pool = WorkerPool::new(
        AnalysisWorker::new(store.clone(), extractor),
        Arc::new(queue.clone()),
    );

    // Three bytes: "abc"
    let (status, doc) = send(&app, upload("a.png", "YWJj")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["id"], 1);
    let file_path = doc["file_path"].as_str().unwrap().to_string();
    assert_eq!(std::fs::read(&file_path).unwrap(), b"abc");

    let (status, started) = send(&app, call("POST", "/api/v1/doc_analyse/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], "started");
    let task_id = started["task_id"].as_str().unwrap().to_string();

    // Not analysed yet.
    let (status, _) = send(&app, get("/api/v1/get_text/1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(pool.run_once("scenario").await.unwrap());

    let (status, task) = send(&app, get(&format!("/api/v1/task_status/{}", task_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "success");
    assert_eq!(
        task["result"],
        json!({"status": "success", "document_id": 1, "text_length": 5})
    );

    let (status, text) = send(&app, get("/api/v1/get_text/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        text,
        json!({"document_id": 1, "extracted_text": "HELLO", "status": "success"})
    );

    let (status, deleted) = send(&app, call("DELETE", "/api/v1/doc_delete/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["success"], true);
    assert!(!std::path::Path::new(&file_path).exists());

    let (status, missing) = send(&app, get("/api/v1/get_text/1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["message"], "Text not found for document 1");
}

#[tokio::test]
async fn test_job_for_deleted_document_fails() {
    let dir = tempdir().unwrap();
    let settings = test_settings(dir.path());
    let ctx = DbContext::from_sqlite_path(&settings.database_path());
    ctx.init_schema().await.unwrap();

    let store: Arc<dyn DocumentStore> = Arc::new(ctx.documents());
    let extractor = Arc::new(FixedTextExtractor::new("HELLO"));
    let queue: DieselTaskQueue = ctx.tasks();
    let app = create_router(AppState::new(
        &settings,
        store.clone(),
        Arc::new(queue.clone()),
        extractor.clone(),
    ));
    let pool = WorkerPool::new(AnalysisWorker::new(store, extractor), Arc::new(queue));

    send(&app, upload("a.png", "YWJj")).await;
    let (_, started) = send(&app, call("POST", "/api/v1/doc_analyse/1")).await;
    let task_id = started["task_id"].as_str().unwrap().to_string();

    // Deleted between dispatch and execution.
    let (status, _) = send(&app, call("DELETE", "/api/v1/doc_delete/1")).await;
    assert_eq!(status, StatusCode::OK);

    assert!(pool.run_once("scenario").await.unwrap());

    let (_, task) = send(&app, get(&format!("/api/v1/task_status/{}", task_id))).await;
    assert_eq!(task["status"], "failed");
    assert_eq!(task["result"]["error"], "Document with id 1 not found");
}

#[tokio::test]
async fn test_health_reports_every_service() {
    let dir = tempdir().unwrap();
    let settings = test_settings(dir.path());
    let ctx = DbContext::from_sqlite_path(&settings.database_path());
    ctx.init_schema().await.unwrap();

    let app = create_router(AppState::new(
        &settings,
        Arc::new(ctx.documents()),
        Arc::new(MemoryTaskQueue::new()),
        Arc::new(FixedTextExtractor::new("")),
    ));

    let (status, health) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = health["services"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["service"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["API", "Message Broker", "OCR Engine", "Database"]);
    assert_eq!(health["status"], "Degraded");
}
