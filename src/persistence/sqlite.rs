//! SQLite-backed persistence sink.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    trend_rows, AnalysisRecord, PersistenceError, PersistenceResult, PersistenceSink,
    PersistenceStats, RequestMetadata, TrendPoint,
};
use crate::config::PersistenceConfig;
use crate::models::{normalize_location, CompositeResult};

#[derive(Debug, Clone)]
pub struct SqlitePersistenceSink {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: i64,
    analysis_id: String,
    fingerprint: String,
    location: String,
    display_location: String,
    radius: f64,
    overall_score: f64,
    partial: bool,
    elapsed_ms: i64,
    result_json: String,
    created_at: i64,
}

impl TryFrom<RecordRow> for AnalysisRecord {
    type Error = PersistenceError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(AnalysisRecord {
            id: row.id,
            analysis_id: Uuid::parse_str(&row.analysis_id)
                .map_err(|e| PersistenceError::Decode(format!("analysis_id: {e}")))?,
            fingerprint: row.fingerprint,
            location: row.location,
            display_location: row.display_location,
            radius: row.radius,
            overall_score: row.overall_score,
            partial: row.partial,
            elapsed_ms: u64::try_from(row.elapsed_ms).unwrap_or(0),
            result: serde_json::from_str(&row.result_json)?,
            created_at: from_millis(row.created_at)?,
        })
    }
}

const RECORD_COLUMNS: &str = "id, analysis_id, fingerprint, location, display_location, radius, \
     overall_score, partial, elapsed_ms, result_json, created_at";

fn from_millis(millis: i64) -> PersistenceResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| PersistenceError::Decode(format!("timestamp out of range: {millis}")))
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

impl SqlitePersistenceSink {
    /// Open (creating if missing) the configured database and run migrations
    pub async fn connect(config: &PersistenceConfig) -> PersistenceResult<Self> {
        let in_memory = is_in_memory(&config.database_url);

        let mut options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // every connection to an in-memory database sees its own copy, so
        // keep exactly one alive for the life of the pool
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        let sink = Self::from_pool(pool).await?;

        info!(in_memory = in_memory, "SQLite persistence sink ready");
        Ok(sink)
    }

    /// Wrap an existing pool, running migrations first
    pub async fn from_pool(pool: SqlitePool) -> PersistenceResult<Self> {
        let sink = Self { pool };
        sink.migrate().await?;
        Ok(sink)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> PersistenceResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS analysis_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                analysis_id TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                location TEXT NOT NULL,
                display_location TEXT NOT NULL,
                radius REAL NOT NULL,
                overall_score REAL NOT NULL,
                partial INTEGER NOT NULL,
                elapsed_ms INTEGER NOT NULL,
                result_json TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_analysis_records_location \
             ON analysis_records (location, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_analysis_records_created_at \
             ON analysis_records (created_at)",
            r#"
            CREATE TABLE IF NOT EXISTS location_trends (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_id INTEGER NOT NULL,
                location TEXT NOT NULL,
                metric TEXT NOT NULL,
                score REAL NOT NULL,
                recorded_at INTEGER NOT NULL,
                FOREIGN KEY (record_id) REFERENCES analysis_records(id)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_location_trends_lookup \
             ON location_trends (location, metric, recorded_at)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::Migration(e.to_string()))?;
        }

        debug!("Persistence migrations applied");
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for SqlitePersistenceSink {
    async fn save(
        &self,
        result: &CompositeResult,
        metadata: &RequestMetadata,
    ) -> PersistenceResult<i64> {
        let created_at = Utc::now().timestamp_millis();
        let result_json = serde_json::to_string(result)
            .map_err(|e| PersistenceError::Decode(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        let record_id = sqlx::query(
            r#"
            INSERT INTO analysis_records (
                analysis_id, fingerprint, location, display_location, radius,
                overall_score, partial, elapsed_ms, result_json, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(metadata.analysis_id.to_string())
        .bind(metadata.fingerprint.as_str())
        .bind(&result.location)
        .bind(&metadata.display_location)
        .bind(result.radius)
        .bind(result.overall_score)
        .bind(result.partial)
        .bind(i64::try_from(metadata.elapsed_ms).unwrap_or(i64::MAX))
        .bind(&result_json)
        .bind(created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (metric, score) in trend_rows(result) {
            sqlx::query(
                "INSERT INTO location_trends (record_id, location, metric, score, recorded_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record_id)
            .bind(&result.location)
            .bind(&metric)
            .bind(score)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(record_id = record_id, location = %result.location, "Saved analysis record");
        Ok(record_id)
    }

    async fn get(&self, id: i64) -> PersistenceResult<Option<AnalysisRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM analysis_records WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AnalysisRecord::try_from).transpose()
    }

    async fn query_by_location(
        &self,
        location: &str,
        limit: usize,
    ) -> PersistenceResult<Vec<AnalysisRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM analysis_records \
             WHERE location = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(normalize_location(location))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AnalysisRecord::try_from).collect()
    }

    async fn query_trend(
        &self,
        location: &str,
        metric: &str,
        since: DateTime<Utc>,
    ) -> PersistenceResult<Vec<TrendPoint>> {
        let rows: Vec<(String, f64, i64)> = sqlx::query_as(
            "SELECT metric, score, recorded_at FROM location_trends \
             WHERE location = ? AND metric = ? AND recorded_at >= ? \
             ORDER BY recorded_at ASC, id ASC",
        )
        .bind(normalize_location(location))
        .bind(metric.trim().to_lowercase())
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(metric, score, recorded_at)| {
                Ok(TrendPoint {
                    metric,
                    score,
                    recorded_at: from_millis(recorded_at)?,
                })
            })
            .collect()
    }

    async fn recent(&self, limit: usize) -> PersistenceResult<Vec<AnalysisRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM analysis_records \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AnalysisRecord::try_from).collect()
    }

    async fn statistics(&self) -> PersistenceResult<PersistenceStats> {
        let (total, partial, unique_locations, average): (i64, Option<i64>, i64, Option<f64>) =
            sqlx::query_as(
                "SELECT COUNT(*), SUM(partial), COUNT(DISTINCT location), AVG(overall_score) \
                 FROM analysis_records",
            )
            .fetch_one(&self.pool)
            .await?;

        let total = u64::try_from(total).unwrap_or(0);
        let partial = u64::try_from(partial.unwrap_or(0)).unwrap_or(0);

        Ok(PersistenceStats {
            total_analyses: total,
            complete_analyses: total.saturating_sub(partial),
            partial_analyses: partial,
            unique_locations: u64::try_from(unique_locations).unwrap_or(0),
            average_score: average.map(|avg| (avg * 100.0).round() / 100.0),
        })
    }

    async fn prune_older_than(&self, days: u32) -> PersistenceResult<u64> {
        let cutoff = (Utc::now() - ChronoDuration::days(i64::from(days))).timestamp_millis();

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM location_trends WHERE recorded_at < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM analysis_records WHERE created_at < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        info!(deleted = deleted, days = days, "Pruned old analysis records");
        Ok(deleted)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:sitescore?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://sitescore.db"));
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let now = Utc::now();
        let restored = from_millis(now.timestamp_millis()).unwrap();
        assert_eq!(restored.timestamp_millis(), now.timestamp_millis());
    }
}
