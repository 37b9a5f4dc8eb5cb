//! Processing result persistence
//!
//! Every save is one transaction covering the result row, its metric rows
//! and the band rows of each spectrum. Readers never observe a partial
//! result.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use nitk_common::time::{from_db_string, to_db_string};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};

use crate::error::IngestError;
use crate::models::{finite, Metric, MetricType, Spectrum, SpectrumPoint, StoredMetrics, StoredResult};

/// Ordering for history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryOrder {
    /// Newest first
    #[default]
    Desc,
    /// Oldest first
    Asc,
}

impl HistoryOrder {
    fn sql(&self) -> &'static str {
        match self {
            HistoryOrder::Desc => "DESC",
            HistoryOrder::Asc => "ASC",
        }
    }
}

const RESULT_COLUMNS: &str = "id, file_path, file_dir, file_name, timestamp";

/// Store for processing results
#[derive(Debug, Clone)]
pub struct ResultStore {
    pool: SqlitePool,
}

impl ResultStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist one result with all its metrics; returns the new result id
    pub async fn save(
        &self,
        file_path: &str,
        file_dir: &str,
        metrics: &[Metric],
    ) -> Result<i64, IngestError> {
        self.save_at(file_path, file_dir, metrics, Utc::now()).await
    }

    /// Persist with an explicit clock reading
    ///
    /// The stored timestamp is `now`, raised to the newest stored timestamp
    /// if the clock reads earlier, so timestamps never decrease.
    pub async fn save_at(
        &self,
        file_path: &str,
        file_dir: &str,
        metrics: &[Metric],
        now: DateTime<Utc>,
    ) -> Result<i64, IngestError> {
        let mut tx = self.pool.begin().await?;

        match insert_result(&mut *tx, file_path, file_dir, metrics, now).await {
            Ok(result_id) => {
                tx.commit().await?;
                info!(
                    result_id,
                    file_path,
                    metrics = metrics.len(),
                    "Saved processing result"
                );
                Ok(result_id)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed after save error: {}", rollback_err);
                }
                error!(file_path, "Failed to save processing result: {}", e);
                Err(e)
            }
        }
    }

    /// Most recent result
    pub async fn get_latest(&self) -> Result<Option<StoredResult>, IngestError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM processing_result ORDER BY timestamp DESC, id DESC LIMIT 1",
            RESULT_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Page of results ordered by timestamp
    pub async fn get_history(
        &self,
        limit: u32,
        offset: u32,
        order: HistoryOrder,
    ) -> Result<Vec<StoredResult>, IngestError> {
        let sql = format!(
            "SELECT {cols} FROM processing_result ORDER BY timestamp {dir}, id {dir} LIMIT ? OFFSET ?",
            cols = RESULT_COLUMNS,
            dir = order.sql()
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;
        self.hydrate_all(&rows).await
    }

    /// Newest result in `file_dir` whose file name starts with `channel_prefix`
    pub async fn latest_for_channel(
        &self,
        file_dir: &str,
        channel_prefix: &str,
    ) -> Result<Option<StoredResult>, IngestError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM processing_result \
             WHERE file_dir = ? AND substr(file_name, 1, length(?)) = ? \
             ORDER BY timestamp DESC, id DESC LIMIT 1",
            RESULT_COLUMNS
        ))
        .bind(file_dir)
        .bind(channel_prefix)
        .bind(channel_prefix)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// All results for a channel prefix, oldest first, optionally from `since` onward
    pub async fn all_for_channel(
        &self,
        channel_prefix: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredResult>, IngestError> {
        let since = since.map(|ts| to_db_string(&ts));
        let rows = sqlx::query(&format!(
            "SELECT {} FROM processing_result \
             WHERE substr(file_name, 1, length(?)) = ? AND (? IS NULL OR timestamp >= ?) \
             ORDER BY timestamp ASC, id ASC",
            RESULT_COLUMNS
        ))
        .bind(channel_prefix)
        .bind(channel_prefix)
        .bind(since.as_deref())
        .bind(since.as_deref())
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_all(&rows).await
    }

    /// Number of stored results
    pub async fn count(&self) -> Result<i64, IngestError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM processing_result")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Delete results older than `max_age_days` with their metrics and bands
    ///
    /// Returns the number of result rows removed.
    pub async fn cleanup(&self, max_age_days: u32) -> Result<u64, IngestError> {
        let cutoff = to_db_string(&(Utc::now() - Duration::days(max_age_days as i64)));
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM spectrum_data WHERE metric_id IN (
                SELECT m.id FROM processing_metrics m
                JOIN processing_result r ON m.result_id = r.id
                WHERE r.timestamp < ?
            )
            "#,
        )
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM processing_metrics WHERE result_id IN \
             (SELECT id FROM processing_result WHERE timestamp < ?)",
        )
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?;

        let removed = sqlx::query("DELETE FROM processing_result WHERE timestamp < ?")
            .bind(&cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if removed > 0 {
            info!(removed, max_age_days, "Removed expired processing results");
        } else {
            debug!(max_age_days, "No expired processing results");
        }
        Ok(removed)
    }

    async fn hydrate_all(&self, rows: &[SqliteRow]) -> Result<Vec<StoredResult>, IngestError> {
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(self.hydrate(row).await?);
        }
        Ok(results)
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<StoredResult, IngestError> {
        let id: i64 = row.try_get("id")?;
        let raw_ts: String = row.try_get("timestamp")?;
        let timestamp = from_db_string(&raw_ts).ok_or_else(|| {
            IngestError::Persistence(sqlx::Error::Decode(
                format!("result {} has unparseable timestamp {:?}", id, raw_ts).into(),
            ))
        })?;

        Ok(StoredResult {
            id,
            file_path: row.try_get("file_path")?,
            file_dir: row.try_get("file_dir")?,
            file_name: row.try_get("file_name")?,
            timestamp,
            metrics: self.load_metrics(id).await?,
        })
    }

    async fn load_metrics(&self, result_id: i64) -> Result<StoredMetrics, IngestError> {
        let rows = sqlx::query(
            "SELECT id, metric_name, metric_value, metric_type FROM processing_metrics \
             WHERE result_id = ? ORDER BY id",
        )
        .bind(result_id)
        .fetch_all(&self.pool)
        .await?;

        let mut metrics = StoredMetrics::default();
        for row in rows {
            let metric_id: i64 = row.try_get("id")?;
            let name: String = row.try_get("metric_name")?;
            let kind: String = row.try_get("metric_type")?;

            match MetricType::parse(&kind) {
                Some(MetricType::Numeric) => {
                    let value: Option<f64> = row.try_get("metric_value")?;
                    metrics.push_numeric(name, value);
                }
                Some(MetricType::Spectrum) => {
                    let bands = sqlx::query(
                        "SELECT frequency, value FROM spectrum_data WHERE metric_id = ? ORDER BY id",
                    )
                    .bind(metric_id)
                    .fetch_all(&self.pool)
                    .await?;
                    let points = bands
                        .iter()
                        .map(|b| {
                            Ok(SpectrumPoint {
                                label: b.try_get("frequency")?,
                                value: b.try_get("value")?,
                            })
                        })
                        .collect::<Result<Vec<_>, sqlx::Error>>()?;
                    metrics.push_spectrum(name, Spectrum(points));
                }
                None => warn!(metric_id, kind = %kind, "Skipping metric with unknown type"),
            }
        }
        Ok(metrics)
    }
}

async fn insert_result(
    conn: &mut SqliteConnection,
    file_path: &str,
    file_dir: &str,
    metrics: &[Metric],
    now: DateTime<Utc>,
) -> Result<i64, IngestError> {
    let newest: Option<String> = sqlx::query_scalar("SELECT MAX(timestamp) FROM processing_result")
        .fetch_one(&mut *conn)
        .await?;
    let timestamp = match newest.as_deref().and_then(from_db_string) {
        Some(prev) if prev > now => prev,
        _ => now,
    };

    let file_name = Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.to_string());

    let result_id = sqlx::query(
        "INSERT INTO processing_result (file_path, file_dir, file_name, timestamp) VALUES (?, ?, ?, ?)",
    )
    .bind(file_path)
    .bind(file_dir)
    .bind(&file_name)
    .bind(to_db_string(&timestamp))
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    for metric in metrics {
        let value = match metric {
            Metric::Numeric { value, .. } => value.and_then(finite),
            Metric::Spectrum { .. } => None,
        };
        let metric_id = sqlx::query(
            "INSERT INTO processing_metrics (result_id, metric_name, metric_value, metric_type) VALUES (?, ?, ?, ?)",
        )
        .bind(result_id)
        .bind(metric.name())
        .bind(value)
        .bind(metric.metric_type().as_str())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        if let Metric::Spectrum { points, .. } = metric {
            for point in points {
                sqlx::query("INSERT INTO spectrum_data (metric_id, frequency, value) VALUES (?, ?, ?)")
                    .bind(metric_id)
                    .bind(&point.label)
                    .bind(point.value.and_then(finite))
                    .execute(&mut *conn)
                    .await?;
            }
        }
    }

    Ok(result_id)
}
