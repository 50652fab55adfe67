//! SQLite-backed [`HistoryStore`].
//!
//! The whole history is one JSON array stored under [`HISTORY_KEY`] in the
//! `kv_store` table. Every mutation is a read-modify-write of that value,
//! serialized by a mutex so concurrent appends cannot drop records.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::models::HistoryRecord;
use crate::{db, migrate};

use super::{HistoryStore, HISTORY_KEY};

pub struct SqliteHistoryStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Connects to the configured database and ensures the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    /// The persisted JSON exactly as stored, or `None` before the first write.
    pub async fn persisted_json(&self) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
                .bind(HISTORY_KEY)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn load(&self) -> Result<Vec<HistoryRecord>> {
        match self.persisted_json().await? {
            Some(json) => serde_json::from_str(&json)
                .with_context(|| format!("corrupt history under key '{}'", HISTORY_KEY)),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, records: &[HistoryRecord]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(HISTORY_KEY)
        .bind(json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn list(&self) -> Result<Vec<HistoryRecord>> {
        self.load().await
    }

    async fn append(&self, record: HistoryRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        tracing::debug!(id = %record.id, kind = %record.kind, "appending history record");
        records.push(record);
        self.save(&records).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records).await?;
        tracing::debug!(id, "deleted history record");
        Ok(true)
    }
}
