//! HTTP API for uploading documents, running OCR on them and reading the
//! results back.
//!
//! JSON endpoints live under `/api/v1`; uploaded files are served as they
//! were stored under `/documents`.

mod error;
mod handlers;
mod routes;

pub use error::{status_for, ApiError};
pub use handlers::ALLOWED_UPLOAD_TYPES;
pub use routes::{create_router, API_PREFIX};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use crate::analysis::AnalysisDispatcher;
use crate::config::Settings;
use crate::health::HealthAggregator;
use crate::lifecycle::DocumentLifecycle;
use crate::ocr::{TesseractBackend, TextExtractor};
use crate::repository::util::redact_url_password;
use crate::repository::DocumentStore;
use crate::work_queue::{AsyncJobSubmitter, MemoryTaskQueue};
use crate::worker::{AnalysisWorker, WorkerPool};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub app_version: String,
    pub lifecycle: DocumentLifecycle,
    pub dispatcher: AnalysisDispatcher,
    pub health: Arc<HealthAggregator>,
    pub documents_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire the use cases from settings and already-built backends.
    pub fn new(
        settings: &Settings,
        store: Arc<dyn DocumentStore>,
        submitter: Arc<dyn AsyncJobSubmitter>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            app_name: settings.app_name.clone(),
            app_version: settings.app_version.clone(),
            lifecycle: DocumentLifecycle::new(store.clone(), settings.documents_dir.clone()),
            dispatcher: AnalysisDispatcher::new(store.clone(), submitter),
            health: Arc::new(HealthAggregator::from_settings(settings, extractor, store)),
            documents_dir: settings.documents_dir.clone(),
            max_upload_bytes: settings.max_upload_mb * 1024 * 1024,
        }
    }
}

/// Start the web server.
///
/// With `embedded_worker`, jobs go to an in-process queue drained by a worker
/// pool in this process. Otherwise they are written to the database for a
/// separate `docsift worker`.
pub async fn serve(settings: &Settings, bind: &str, embedded_worker: bool) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let ctx = settings.create_db_context()?;
    ctx.init_schema().await?;
    tracing::info!("Using database {}", redact_url_password(&settings.database_url()));

    let store: Arc<dyn DocumentStore> = Arc::new(ctx.documents());
    let extractor: Arc<dyn TextExtractor> = Arc::new(TesseractBackend::new(
        settings.tesseract_path.clone(),
        settings.ocr_language.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut worker = None;
    let submitter: Arc<dyn AsyncJobSubmitter> = if embedded_worker {
        let queue = MemoryTaskQueue::new();
        let pool = WorkerPool::new(
            AnalysisWorker::new(store.clone(), extractor.clone()),
            Arc::new(queue.clone()),
        )
        .with_slots(settings.worker_slots)
        .with_poll_interval(settings.poll_interval());
        worker = Some(tokio::spawn(pool.run(shutdown_rx)));
        Arc::new(queue)
    } else {
        Arc::new(ctx.tasks())
    };

    let state = AppState::new(settings, store, submitter, extractor);
    let app = create_router(state);

    let addr: SocketAddr = bind.parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(worker) = worker {
        worker.await?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
