//! Snapshot repository: history of the live conflict's point-in-time returns

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted live-event snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SnapshotRecord {
    pub id: Option<i64>,
    pub event_name: String,
    pub spx_days_elapsed: i64,
    pub spx_return: Option<f64>,
    pub spx_low: Option<f64>,
    pub gold_return: Option<f64>,
    pub oil_return: Option<f64>,
    pub captured_at: Option<i64>,
}

/// Repository for live-event snapshots
pub struct SnapshotRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SnapshotRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a snapshot; `captured_at` defaults to now when not set
    pub async fn save_snapshot(&self, record: &SnapshotRecord) -> DbResult<i64> {
        let result = sqlx::query(
            r#"INSERT INTO current_snapshots
                (event_name, spx_days_elapsed, spx_return, spx_low, gold_return, oil_return,
                 captured_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, COALESCE(?7, strftime('%s', 'now')))
            "#,
        )
        .bind(&record.event_name)
        .bind(record.spx_days_elapsed)
        .bind(record.spx_return)
        .bind(record.spx_low)
        .bind(record.gold_return)
        .bind(record.oil_return)
        .bind(record.captured_at)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Snapshots for an event, newest first
    pub async fn get_history(&self, event_name: &str, limit: i64) -> DbResult<Vec<SnapshotRecord>> {
        let records = sqlx::query_as::<_, SnapshotRecord>(
            r#"SELECT * FROM current_snapshots
               WHERE event_name = ?1
               ORDER BY captured_at DESC, id DESC
               LIMIT ?2"#,
        )
        .bind(event_name)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Most recent snapshot for an event
    pub async fn latest(&self, event_name: &str) -> DbResult<Option<SnapshotRecord>> {
        Ok(self.get_history(event_name, 1).await?.into_iter().next())
    }

    /// Total number of stored snapshots across all events
    pub async fn count(&self) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM current_snapshots")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
