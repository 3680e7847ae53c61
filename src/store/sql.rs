//! MySQL-backed log store
//!
//! The table has no change stream, so `subscribe` always reports
//! `Unsupported` and the relay tails it by range queries.

use super::entity::{Column, Entity as ConsoleLog};
use super::{EntryFeed, LogStore, StoreError};
use crate::relay::{LogEntry, Position};
use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Select,
};

#[derive(Clone)]
pub struct SqlLogStore {
    db: DatabaseConnection,
}

impl SqlLogStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Rows strictly after `after` in `(received_at, id)` order
fn range_query(after: Option<Position>, limit: usize) -> Select<ConsoleLog> {
    let mut query = ConsoleLog::find();

    if let Some(position) = after {
        let condition = match position.id {
            // Seeded from an instant: everything received at or after it
            None => Condition::all().add(Column::ReceivedAt.gte(position.received_at)),
            Some(id) => Condition::any()
                .add(Column::ReceivedAt.gt(position.received_at))
                .add(
                    Condition::all()
                        .add(Column::ReceivedAt.eq(position.received_at))
                        .add(Column::Id.gt(id)),
                ),
        };
        query = query.filter(condition);
    }

    query
        .order_by_asc(Column::ReceivedAt)
        .order_by_asc(Column::Id)
        .limit(limit as u64)
}

#[async_trait]
impl LogStore for SqlLogStore {
    async fn subscribe(&self) -> Result<EntryFeed, StoreError> {
        Err(StoreError::Unsupported(
            "console_log table has no change stream".to_string(),
        ))
    }

    async fn query_after(
        &self,
        after: Option<Position>,
        limit: usize,
    ) -> Result<Vec<LogEntry>, StoreError> {
        let rows = range_query(after, limit).all(&self.db).await?;
        Ok(rows.into_iter().map(LogEntry::from).collect())
    }
}
