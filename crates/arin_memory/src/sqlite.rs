use anyhow::{Context, Result};
use arin_core::{PersistenceError, Progress, ProgressStore, COUNT_KEY, ENDED_KEY};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;

/// Key-value table in a SQLite file. Values are stored as strings so the
/// same keys can be read back by anything that speaks the string encoding.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        // A single connection keeps `:memory:` databases coherent.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create kv table")?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read key {key}"))?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write key {key}"))?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete key {key}"))?;
        Ok(())
    }

    async fn save_pair(&self, count: &str, ended: &str) -> Result<()> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        for (key, value) in [(COUNT_KEY, count), (ENDED_KEY, ended)] {
            sqlx::query(
                "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to write key {key}"))?;
        }
        tx.commit().await.context("Failed to commit progression")?;
        Ok(())
    }
}

fn backend(e: anyhow::Error) -> PersistenceError {
    PersistenceError::Backend(format!("{:#}", e))
}

#[async_trait]
impl ProgressStore for SqliteStore {
    async fn load(&self) -> Result<Progress, PersistenceError> {
        let count = self.get(COUNT_KEY).await.map_err(backend)?;
        let ended = self.get(ENDED_KEY).await.map_err(backend)?;
        Ok(Progress::decode(count.as_deref(), ended.as_deref()))
    }

    async fn save(&self, progress: Progress) -> Result<(), PersistenceError> {
        let (count, ended) = progress.encode();
        self.save_pair(&count, &ended).await.map_err(backend)?;
        tracing::debug!(count = progress.count, ended = progress.ended, "Progression saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.remove(COUNT_KEY).await.map_err(backend)?;
        self.remove(ENDED_KEY).await.map_err(backend)?;
        tracing::debug!("Progression cleared");
        Ok(())
    }
}
