//! Observable relay state published over a `watch` channel

use super::channels::ChannelSet;
use super::coordinator::TailingMode;
use super::cursor::Cursor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use utoipa::ToSchema;

/// Per-process counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    /// Entries that went through classification
    pub processed: u64,
    pub forwarded: u64,
    /// Below the forwarding policy
    pub suppressed: u64,
    /// Forwardable but no destination resolved
    pub unrouted: u64,
    pub send_failures: u64,
    pub duplicates: u64,
    pub query_failures: u64,
    pub channel_refreshes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelaySnapshot {
    pub mode: TailingMode,
    pub mode_since: DateTime<Utc>,
    /// Receipt time of the last processed entry
    pub cursor: Option<DateTime<Utc>>,
    pub cursor_id: Option<i64>,
    #[schema(value_type = Object)]
    pub channels: ChannelSet,
    pub stats: RelayStats,
    pub last_error: Option<String>,
}

impl Default for RelaySnapshot {
    fn default() -> Self {
        Self {
            mode: TailingMode::Stopped,
            mode_since: Utc::now(),
            cursor: None,
            cursor_id: None,
            channels: ChannelSet::default(),
            stats: RelayStats::default(),
            last_error: None,
        }
    }
}

/// Write side of the relay status; cheap to clone
#[derive(Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<RelaySnapshot>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(RelaySnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<RelaySnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        self.tx.borrow().clone()
    }

    pub fn set_mode(&self, mode: TailingMode) {
        self.tx.send_if_modified(|s| {
            if s.mode == mode {
                return false;
            }
            s.mode = mode;
            s.mode_since = Utc::now();
            true
        });
    }

    pub fn set_cursor(&self, cursor: &Cursor) {
        let position = cursor.position();
        self.tx.send_modify(|s| {
            s.cursor = position.map(|p| p.received_at);
            s.cursor_id = position.and_then(|p| p.id);
        });
    }

    pub fn set_channels(&self, channels: &ChannelSet) {
        self.tx.send_modify(|s| s.channels = channels.clone());
    }

    pub fn set_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.tx.send_modify(|s| s.last_error = Some(error));
    }

    pub fn update_stats(&self, update: impl FnOnce(&mut RelayStats)) {
        self.tx.send_modify(|s| update(&mut s.stats));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::entry::Position;

    #[test]
    fn should_publish_updates_to_subscribers() {
        // Arrange
        let board = StatusBoard::new();
        let rx = board.subscribe();
        let at = Utc::now();

        // Act
        board.set_mode(TailingMode::Pull);
        board.set_cursor(&Cursor::starting_at(Position::at(at, 7)));
        board.update_stats(|s| s.forwarded += 2);

        // Assert
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.mode, TailingMode::Pull);
        assert_eq!(snapshot.cursor, Some(at));
        assert_eq!(snapshot.cursor_id, Some(7));
        assert_eq!(snapshot.stats.forwarded, 2);
    }

    #[test]
    fn should_keep_mode_since_when_mode_is_unchanged() {
        let board = StatusBoard::new();
        board.set_mode(TailingMode::Push);
        let since = board.snapshot().mode_since;

        board.set_mode(TailingMode::Push);

        assert_eq!(board.snapshot().mode_since, since);
    }
}
