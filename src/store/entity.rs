use crate::relay::{LogEntry, LogLevel};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Row of the `console_log` table written by the plugin ingest API
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "console_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub level: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub source: String,
    pub server: String,
    pub minecraft_timestamp: Option<DateTimeUtc>,
    pub received_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for LogEntry {
    fn from(row: Model) -> Self {
        Self {
            id: row.id,
            level: LogLevel::from(row.level),
            message: row.message,
            source: row.source,
            server_tag: row.server,
            origin_timestamp: row.minecraft_timestamp,
            received_at: row.received_at,
        }
    }
}
