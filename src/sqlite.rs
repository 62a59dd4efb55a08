//! SQLite-backed repository.

use std::{path::Path, str::FromStr};

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{info, instrument};

use crate::{
    codec::ValueType,
    error::{Error, Result},
    repo::Repository,
    StoredSample, Time,
};

const MEMORY: &str = ":memory:";

type Row = (String, String, Vec<u8>, i64);

#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}
impl SqliteRepository {
    pub async fn new_in_memory() -> Result<Self> {
        Self::open(MEMORY).await
    }

    /// Opens (creating if missing) the database at `path` and applies the schema.
    #[instrument(skip(path))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening sample store at {:?}", path);
        let pool = if path == Path::new(MEMORY) {
            // Each in-memory connection would otherwise see its own database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(SqliteConnectOptions::from_str(MEMORY)?)
                .await?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::StorageFailure {
                        reason: format!("failed to create directory {}: {e}", parent.display()),
                    })?;
            }
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let repo = Self { pool };
        repo.migrate().await?;
        info!("sample store ready");
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL,
                type TEXT NOT NULL,
                value BLOB NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_key_ts ON metrics(key, timestamp)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_ts ON metrics(timestamp)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn to_sample((key, value_type, value, millis): Row) -> Result<StoredSample> {
    let time = DateTime::from_timestamp_millis(millis).ok_or_else(|| Error::InvalidTime {
        input: millis.to_string(),
    })?;
    Ok(StoredSample {
        key,
        value_type,
        value,
        time,
    })
}

#[async_trait]
impl Repository for SqliteRepository {
    #[instrument(skip(self, value))]
    async fn insert(
        &self,
        key: &str,
        value_type: ValueType,
        value: &[u8],
        time: Time,
    ) -> Result<()> {
        sqlx::query("INSERT INTO metrics (key, type, value, timestamp) VALUES (?, ?, ?, ?)")
            .bind(key)
            .bind(value_type.as_str())
            .bind(value)
            .bind(time.timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn query_by_prefix(
        &self,
        prefix: &str,
        min: Time,
        max: Time,
    ) -> Result<Vec<StoredSample>> {
        // substr keeps the match case-sensitive, unlike LIKE.
        let rows: Vec<Row> = sqlx::query_as(
            r#"
            SELECT key, type, value, timestamp FROM metrics
            WHERE substr(key, 1, length(?1)) = ?1
              AND timestamp >= ?2 AND timestamp <= ?3
            ORDER BY timestamp, id
            "#,
        )
        .bind(prefix)
        .bind(min.timestamp_millis())
        .bind(max.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(to_sample).collect()
    }

    #[instrument(skip(self))]
    async fn query_by_time_range(&self, min: Time, max: Time) -> Result<Vec<StoredSample>> {
        let rows: Vec<Row> = sqlx::query_as(
            r#"
            SELECT key, type, value, timestamp FROM metrics
            WHERE timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp, id
            "#,
        )
        .bind(min.timestamp_millis())
        .bind(max.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(to_sample).collect()
    }
}
