//! Database context for managing the connection pool and repository access.
//!
//! Create one context per process, then hand out repositories from it.
//!
//! # Example
//! ```ignore
//! let ctx = DbContext::from_url(&settings.database_url())?;
//! ctx.init_schema().await?;
//! let doc = ctx.documents().get_document(1).await?;
//! ```

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::diesel_document::DieselDocumentRepository;
use super::pool::{DbError, DbPool, SqliteConn};
use crate::with_conn_split;
use crate::work_queue::DieselTaskQueue;

#[cfg(feature = "postgres")]
use super::pool::PgConn;

const SQLITE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_path TEXT NOT NULL UNIQUE,
        upload_date TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE IF NOT EXISTS document_text (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL REFERENCES documents(id),
        extracted_text TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS analysis_tasks (
        id TEXT PRIMARY KEY,
        document_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        result TEXT,
        worker TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_document_text_document ON document_text(document_id);
    CREATE INDEX IF NOT EXISTS idx_analysis_tasks_status ON analysis_tasks(status, created_at);
"#;

#[cfg(feature = "postgres")]
const POSTGRES_SCHEMA: [&str; 5] = [
    r#"CREATE TABLE IF NOT EXISTS documents (
        id BIGSERIAL PRIMARY KEY,
        file_path TEXT NOT NULL UNIQUE,
        upload_date TEXT NOT NULL DEFAULT to_char(now() AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.MS"Z"')
    )"#,
    r#"CREATE TABLE IF NOT EXISTS document_text (
        id BIGSERIAL PRIMARY KEY,
        document_id BIGINT NOT NULL REFERENCES documents(id),
        extracted_text TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS analysis_tasks (
        id TEXT PRIMARY KEY,
        document_id BIGINT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        result TEXT,
        worker TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_document_text_document ON document_text(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_analysis_tasks_status ON analysis_tasks(status, created_at)",
];

/// Database context that owns the pool and provides repository access.
#[derive(Clone)]
pub struct DbContext {
    pool: DbPool,
}

impl DbContext {
    /// Create a context from a database URL (`sqlite:...`, a file path, or `postgres://...`).
    pub fn from_url(database_url: &str) -> Result<Self, DbError> {
        Ok(Self {
            pool: DbPool::from_url(database_url)?,
        })
    }

    /// Create a context for a SQLite file.
    pub fn from_sqlite_path(db_path: &Path) -> Self {
        Self {
            pool: DbPool::sqlite_from_path(db_path),
        }
    }

    /// Get a document repository.
    pub fn documents(&self) -> DieselDocumentRepository {
        DieselDocumentRepository::new(self.pool.clone())
    }

    /// Get the durable analysis task queue.
    pub fn tasks(&self) -> DieselTaskQueue {
        DieselTaskQueue::new(self.pool.clone())
    }

    /// Create all tables and indexes if they don't exist.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        with_conn_split!(self.pool,
            sqlite: conn => {
                Self::init_sqlite_schema(&mut conn).await
            },
            postgres: conn => {
                Self::init_postgres_schema(&mut conn).await
            }
        )
    }

    async fn init_sqlite_schema(conn: &mut SqliteConn) -> Result<(), DbError> {
        conn.batch_execute(SQLITE_SCHEMA).await
    }

    #[cfg(feature = "postgres")]
    async fn init_postgres_schema(conn: &mut PgConn) -> Result<(), DbError> {
        // PostgreSQL gets one statement at a time
        for statement in POSTGRES_SCHEMA {
            conn.batch_execute(statement).await?;
        }
        Ok(())
    }
}
