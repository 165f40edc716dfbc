//! The dataset cache contract (§4.6). `database::DbRepository` implements
//! this trait against the `trading_datasets` table (runtime-checked sqlx,
//! see DESIGN.md); this crate only depends on the shape, not on `database`
//! itself, so the dependency graph stays one-directional.

use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DatasetCacheRow, SentimentSource};
use uuid::Uuid;

use crate::error::SentimentError;

#[async_trait]
pub trait DatasetCacheStore: Send + Sync {
    /// Returns the cache row, if any, whose `[start_date, end_date]` covers
    /// `date` for `(ticker, source)`.
    async fn lookup(
        &self,
        ticker: &str,
        source: SentimentSource,
        date: NaiveDate,
    ) -> Result<Option<DatasetCacheRow>, SentimentError>;

    /// Idempotent upsert keyed by `(ticker, source, start_date, end_date)`;
    /// per-date entries in `row.data` are merged into any existing row
    /// rather than overwriting it wholesale.
    async fn upsert(&self, row: DatasetCacheRow) -> Result<(), SentimentError>;

    /// Associates every cache row created under `session_id` with the
    /// resulting `bot_id`, once a workflow saves its artifact.
    async fn associate_with_bot(&self, session_id: Uuid, bot_id: Uuid) -> Result<(), SentimentError>;
}

/// An in-memory store, useful for tests and for a cacheless deployment
/// mode; not backed by any persistence.
#[derive(Default)]
pub struct InMemoryCacheStore {
    rows: tokio::sync::Mutex<Vec<DatasetCacheRow>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatasetCacheStore for InMemoryCacheStore {
    async fn lookup(
        &self,
        ticker: &str,
        source: SentimentSource,
        date: NaiveDate,
    ) -> Result<Option<DatasetCacheRow>, SentimentError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|r| {
                r.ticker == ticker
                    && r.data_source == source
                    && r.start_date <= date
                    && date <= r.end_date
            })
            .cloned())
    }

    async fn upsert(&self, row: DatasetCacheRow) -> Result<(), SentimentError> {
        let mut rows = self.rows.lock().await;
        if let Some(existing) = rows.iter_mut().find(|r| {
            r.ticker == row.ticker
                && r.data_source == row.data_source
                && r.start_date == row.start_date
                && r.end_date == row.end_date
        }) {
            existing.data.extend(row.data);
        } else {
            rows.push(row);
        }
        Ok(())
    }

    async fn associate_with_bot(&self, session_id: Uuid, bot_id: Uuid) -> Result<(), SentimentError> {
        let mut rows = self.rows.lock().await;
        for row in rows.iter_mut() {
            if row.session_id == Some(session_id) {
                row.bot_id = Some(bot_id);
            }
        }
        Ok(())
    }
}
