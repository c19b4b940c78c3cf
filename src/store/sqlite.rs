use std::str::FromStr;

use axum::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use time::OffsetDateTime;
use tracing::info;

use super::MetricStore;
use crate::config::StorageCfg;
use crate::error::StoreError;
use crate::ingest::types::MetricDocument;

/// A collection of JSON documents kept in one SQLite table.
pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
    insert_sql: String,
    latest_sql: String,
}

impl SqliteStore {
    pub async fn connect(cfg: &StorageCfg) -> Result<Self, StoreError> {
        let mut options = SqliteConnectOptions::from_str(&cfg.db_url)?.create_if_missing(true);

        if let Some(path) = cfg.db_path() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_with(options)
            .await?;

        info!(db_url = %cfg.db_url, collection = %cfg.collection, "connected to store");

        Self::with_pool(pool, &cfg.collection).await
    }

    /// Wraps an existing pool and makes sure the collection table exists.
    ///
    /// `collection` must already be a validated identifier.
    pub async fn with_pool(pool: SqlitePool, collection: &str) -> Result<Self, StoreError> {
        let store = Self {
            insert_sql: format!("INSERT INTO {collection} (timestamp_ns, document) VALUES (?, ?)"),
            latest_sql: format!(
                "SELECT document FROM {collection} ORDER BY timestamp_ns DESC, id DESC LIMIT 1"
            ),
            collection: collection.to_string(),
            pool,
        };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StoreError> {
        let collection = &self.collection;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {collection} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp_ns INTEGER NOT NULL,
                document TEXT NOT NULL
            );
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{collection}_timestamp ON {collection} (timestamp_ns);"
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MetricStore for SqliteStore {
    async fn insert(&self, doc: &MetricDocument, at: OffsetDateTime) -> Result<(), StoreError> {
        let timestamp_ns = i64::try_from(at.unix_timestamp_nanos()).unwrap_or(i64::MAX);
        let document = serde_json::to_string(doc)?;

        sqlx::query(&self.insert_sql)
            .bind(timestamp_ns)
            .bind(document)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn latest(&self) -> Result<Option<MetricDocument>, StoreError> {
        let row = sqlx::query_scalar::<_, String>(&self.latest_sql)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::Duration;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::with_pool(pool, "metrics").await.unwrap()
    }

    fn doc(v: serde_json::Value) -> MetricDocument {
        serde_json::from_value(v).unwrap()
    }

    #[tokio::test]
    async fn latest_on_empty_collection_is_none() {
        let store = memory_store().await;
        assert!(store.latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_returns_greatest_timestamp() {
        let store = memory_store().await;
        let t0 = OffsetDateTime::now_utc();

        store
            .insert(&doc(json!({"n": 2})), t0 + Duration::seconds(5))
            .await
            .unwrap();
        store.insert(&doc(json!({"n": 1})), t0).await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.get("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn equal_timestamps_resolve_to_last_insert() {
        let store = memory_store().await;
        let t0 = OffsetDateTime::now_utc();

        store.insert(&doc(json!({"n": 1})), t0).await.unwrap();
        store.insert(&doc(json!({"n": 2})), t0).await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.get("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn internal_id_is_not_returned() {
        let store = memory_store().await;
        store
            .insert(&doc(json!({"cpu": 3.5})), OffsetDateTime::now_utc())
            .await
            .unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.into_inner(), json!({"cpu": 3.5}).as_object().unwrap().clone());
    }

    #[tokio::test]
    async fn closed_pool_reports_errors() {
        let store = memory_store().await;
        store.close().await;

        assert!(store.ping().await.is_err());
        assert!(store.latest().await.is_err());
        assert!(store
            .insert(&doc(json!({"a": 1})), OffsetDateTime::now_utc())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn connect_creates_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StorageCfg {
            db_url: format!("sqlite://{}", dir.path().join("nested/eco.db").display()),
            ..StorageCfg::default()
        };

        let store = SqliteStore::connect(&cfg).await.unwrap();
        store.ping().await.unwrap();
        store.close().await;

        assert!(dir.path().join("nested/eco.db").exists());
    }
}
