//! Document store seam.
//!
//! Handlers only see [`MetricStore`]; the SQLite collection is the production
//! implementation.

use axum::async_trait;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::ingest::types::MetricDocument;

mod sqlite;

pub use sqlite::SqliteStore;

#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Appends `doc` as a new record ordered by `at`. No dedup, no existence check.
    async fn insert(&self, doc: &MetricDocument, at: OffsetDateTime) -> Result<(), StoreError>;

    /// The record with the greatest timestamp, without the store's internal id.
    async fn latest(&self) -> Result<Option<MetricDocument>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn close(&self);
}
