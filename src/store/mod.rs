//! Log store read surface
//!
//! The relay consumes two capabilities of the store:
//! - a live feed of inserted entries, best-effort and terminable at any time
//! - a range query returning entries after a position, ascending, capped

pub mod entity;
pub mod memory;
pub mod sql;

use crate::relay::{LogEntry, Position};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub use memory::MemoryLogStore;
pub use sql::SqlLogStore;

/// Live insert feed; an `Err` item or the end of the stream is terminal
pub type EntryFeed = BoxStream<'static, Result<LogEntry, StoreError>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("insert feed not supported: {0}")]
    Unsupported(String),
    #[error("insert feed closed")]
    FeedClosed,
    #[error("insert feed disconnected: {0}")]
    Disconnected(String),
    #[error("insert feed lagged, {0} entries skipped")]
    Lagged(u64),
    #[error("failed to decode entry: {0}")]
    Decode(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Open the live insert feed
    async fn subscribe(&self) -> Result<EntryFeed, StoreError>;

    /// Entries strictly after `after` (all entries when `None`), ascending
    /// by `(received_at, id)`, at most `limit`
    async fn query_after(
        &self,
        after: Option<Position>,
        limit: usize,
    ) -> Result<Vec<LogEntry>, StoreError>;
}
