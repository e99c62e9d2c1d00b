//! Command-line interface.
//!
//! Parses arguments, loads settings and dispatches to the server, the
//! worker and a few maintenance commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use tokio::sync::watch;

use crate::config::Settings;
use crate::health::HealthAggregator;
use crate::models::ServiceState;
use crate::ocr::{TesseractBackend, TextExtractor};
use crate::repository::util::redact_url_password;
use crate::repository::DocumentStore;
use crate::work_queue::AsyncJobSubmitter;
use crate::worker::{AnalysisWorker, WorkerPool};

#[derive(Parser)]
#[command(name = "docsift")]
#[command(about = "Document upload and asynchronous OCR text extraction service")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./docsift.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the database and uploaded documents
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check for the verbose flag before the parser runs, so logging can be
/// set up first.
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Start the HTTP API
    Serve {
        /// Address to bind to (host:port)
        #[arg(short, long)]
        bind: Option<String>,

        /// Run analysis jobs inside the server process
        #[arg(long)]
        embedded_worker: bool,
    },

    /// Process queued analysis jobs
    Worker {
        /// Number of jobs processed concurrently
        #[arg(short, long)]
        slots: Option<usize>,
    },

    /// Check dependent services and print their status
    Health,

    /// Show the status of an analysis task
    Task {
        /// Task id returned by doc_analyse
        task_id: String,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        settings.set_data_dir(data_dir);
    }
    if settings.debug {
        tracing::info!(
            "Debug mode: data in {}, broker {}",
            settings.data_dir.display(),
            redact_url_password(&settings.broker_url)
        );
    }

    match cli.command {
        Commands::Init => cmd_init(&settings).await,
        Commands::Serve {
            bind,
            embedded_worker,
        } => {
            let bind = bind.unwrap_or_else(|| settings.bind.clone());
            cmd_serve(&settings, &bind, embedded_worker).await
        }
        Commands::Worker { slots } => {
            if let Some(slots) = slots {
                settings.worker_slots = slots;
            }
            cmd_worker(&settings).await
        }
        Commands::Health => cmd_health(&settings).await,
        Commands::Task { task_id } => cmd_task(&settings, &task_id).await,
    }
}

/// Create the data directories and the database schema.
async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let ctx = settings.create_db_context()?;
    ctx.init_schema().await?;

    println!(
        "{} Initialized docsift in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  Database: {}", database_label(settings));
    Ok(())
}

/// Human-readable database location with any password redacted.
fn database_label(settings: &Settings) -> String {
    if settings.is_postgres() {
        format!("PostgreSQL {}", redact_url_password(&settings.database_url()))
    } else {
        format!("SQLite {}", settings.database_path().display())
    }
}

async fn cmd_serve(settings: &Settings, bind: &str, embedded_worker: bool) -> anyhow::Result<()> {
    println!(
        "{} Starting {} at http://{}",
        style("→").cyan(),
        settings.app_name,
        bind
    );
    if embedded_worker {
        println!("  Analysis jobs run in this process");
    }
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, bind, embedded_worker).await
}

/// Drain the database-backed queue until Ctrl+C.
async fn cmd_worker(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let ctx = settings.create_db_context()?;
    ctx.init_schema().await?;

    let extractor = tesseract(settings);
    if !extractor.is_available() {
        println!(
            "{} {} not found, jobs will fail until it is installed",
            style("!").yellow(),
            settings.tesseract_path.display()
        );
    }

    let worker = AnalysisWorker::new(Arc::new(ctx.documents()), extractor);
    let pool = WorkerPool::new(worker, Arc::new(ctx.tasks()))
        .with_slots(settings.worker_slots)
        .with_poll_interval(settings.poll_interval());

    println!(
        "{} Worker started with {} slots, press Ctrl+C to stop",
        style("→").cyan(),
        settings.worker_slots
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let running = tokio::spawn(pool.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    println!("{} Waiting for running jobs to finish...", style("!").yellow());
    let _ = shutdown_tx.send(true);
    running.await?;

    Ok(())
}

async fn cmd_health(settings: &Settings) -> anyhow::Result<()> {
    let ctx = settings.create_db_context()?;
    let store: Arc<dyn DocumentStore> = Arc::new(ctx.documents());
    let report = HealthAggregator::from_settings(settings, tesseract(settings), store)
        .get_overall_status()
        .await;

    for service in &report.services {
        let mark = match service.status {
            ServiceState::Ok => style("✓").green(),
            ServiceState::Error => style("✗").red(),
        };
        println!("  {} {:<16} {}", mark, service.service, service.details);
    }
    println!("{} Overall: {}", style("→").cyan(), report.status.as_str());

    Ok(())
}

async fn cmd_task(settings: &Settings, task_id: &str) -> anyhow::Result<()> {
    let ctx = settings.create_db_context()?;
    match ctx.tasks().status(task_id).await? {
        Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
        None => anyhow::bail!("Task {} not found", task_id),
    }
    Ok(())
}

fn tesseract(settings: &Settings) -> Arc<dyn TextExtractor> {
    Arc::new(TesseractBackend::new(
        settings.tesseract_path.clone(),
        settings.ocr_language.clone(),
    ))
}
