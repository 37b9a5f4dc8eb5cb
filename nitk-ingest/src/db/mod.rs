//! Database access for nitk-ingest
//!
//! Three tables hold processing history: one row per processed file, one
//! row per metric, and one row per band of each spectrum metric.

pub mod results;

pub use results::{HistoryOrder, ResultStore};

use crate::error::IngestError;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (creating if needed) the database at `db_path` and ensure the schema exists
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool, IngestError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create tables and indexes if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<(), IngestError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_result (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL,
            file_dir TEXT NOT NULL,
            file_name TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            result_id INTEGER NOT NULL REFERENCES processing_result(id),
            metric_name TEXT NOT NULL,
            metric_value REAL,
            metric_type TEXT NOT NULL CHECK (metric_type IN ('numeric', 'spectrum')),
            UNIQUE (result_id, metric_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS spectrum_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            metric_id INTEGER NOT NULL REFERENCES processing_metrics(id),
            frequency TEXT NOT NULL,
            value REAL,
            UNIQUE (metric_id, frequency)
        )
        "#,
    )
    .execute(pool)
    .await?;

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_result_timestamp ON processing_result(timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_result_file_dir ON processing_result(file_dir)",
        "CREATE INDEX IF NOT EXISTS idx_result_file_name ON processing_result(file_name)",
        "CREATE INDEX IF NOT EXISTS idx_metrics_result_id ON processing_metrics(result_id)",
        "CREATE INDEX IF NOT EXISTS idx_spectrum_metric_id ON spectrum_data(metric_id)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database tables initialized (processing_result, processing_metrics, spectrum_data)");

    Ok(())
}
