//! SQLite state store.
//!
//! A file-based durable store. Good for:
//! - Single-server deployments
//! - The command-line tool
//! - Testing with an in-memory database

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::StateStore;
use crate::types::state::{BrowsingState, SeenSet};

/// SQLite-backed browsing state, one row per consumer.
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Connect and create the table if needed.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://./discovery.db?mode=rwc` - Create if not exists
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Self::from_pool(pool).await
    }

    /// In-memory store for tests. A single connection, since every SQLite
    /// in-memory connection is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS browsing_state (
                consumer_id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                seen_keys TEXT NOT NULL DEFAULT '[]',
                page INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct BrowsingStateRow {
    consumer_id: String,
    category: String,
    seen_keys: String,
    page: i64,
    updated_at: String,
}

impl BrowsingStateRow {
    fn into_state(self) -> StoreResult<BrowsingState> {
        let corrupt = |reason: String| StoreError::Corrupt {
            consumer_id: self.consumer_id.clone(),
            reason,
        };

        let category = self
            .category
            .parse()
            .map_err(|e: crate::error::DiscoveryError| corrupt(e.to_string()))?;
        let seen: SeenSet = serde_json::from_str(&self.seen_keys)?;
        let updated_at = chrono::DateTime::parse_from_rfc3339(&self.updated_at)
            .map_err(|e| corrupt(format!("invalid updated_at: {}", e)))?
            .with_timezone(&chrono::Utc);
        let page = u32::try_from(self.page).map_err(|_| corrupt(format!("invalid page {}", self.page)))?;

        Ok(BrowsingState {
            category,
            seen,
            page: page.max(1),
            updated_at,
        })
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get_state(&self, consumer_id: &str) -> StoreResult<Option<BrowsingState>> {
        let row: Option<BrowsingStateRow> = sqlx::query_as(
            "SELECT consumer_id, category, seen_keys, page, updated_at FROM browsing_state WHERE consumer_id = ?",
        )
        .bind(consumer_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BrowsingStateRow::into_state).transpose()
    }

    async fn put_state(&self, consumer_id: &str, state: &BrowsingState) -> StoreResult<()> {
        let seen_keys = serde_json::to_string(&state.seen)?;

        sqlx::query(
            r#"
            INSERT INTO browsing_state (consumer_id, category, seen_keys, page, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(consumer_id) DO UPDATE SET
                category = excluded.category,
                seen_keys = excluded.seen_keys,
                page = excluded.page,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(consumer_id)
        .bind(state.category.as_str())
        .bind(&seen_keys)
        .bind(i64::from(state.page))
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_state(&self, consumer_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM browsing_state WHERE consumer_id = ?")
            .bind(consumer_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
