//! Resumption point shared by both tailing modes

use super::entry::{LogEntry, Position};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Last successfully processed position
///
/// Only moves forward. It is owned by whichever tailing mode is active and
/// handed over by value/reference, never shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    last: Option<Position>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(position: Position) -> Self {
        Self {
            last: Some(position),
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.last
    }

    pub fn last_received_at(&self) -> Option<DateTime<Utc>> {
        self.last.map(|p| p.received_at)
    }

    pub fn is_set(&self) -> bool {
        self.last.is_some()
    }

    /// Set the cursor to `instant` unless it already holds a position
    ///
    /// Returns true when the seed was applied.
    pub fn seed_if_unset(&mut self, instant: DateTime<Utc>) -> bool {
        if self.last.is_some() {
            return false;
        }
        self.last = Some(Position::instant(instant));
        true
    }

    /// Whether `entry` has not been processed yet
    pub fn admits(&self, entry: &LogEntry) -> bool {
        match self.last {
            Some(last) => last.precedes(entry),
            None => true,
        }
    }

    /// Move to `position`; positions at or behind the current one are ignored
    pub fn advance(&mut self, position: Position) -> bool {
        match self.last {
            Some(last) if position <= last => {
                debug!(?position, current = ?last, "Ignoring non-forward cursor move");
                false
            }
            _ => {
                self.last = Some(position);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::entry::LogLevel;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap()
    }

    fn entry(id: i64, secs: i64) -> LogEntry {
        LogEntry {
            id,
            level: LogLevel::Info,
            message: "tick".to_string(),
            source: "Server".to_string(),
            server_tag: "main".to_string(),
            origin_timestamp: None,
            received_at: ts(secs),
        }
    }

    #[test]
    fn should_never_move_backwards() {
        // Arrange
        let mut cursor = Cursor::new();
        cursor.advance(Position::at(ts(10), 5));

        // Act
        let moved_back = cursor.advance(Position::at(ts(9), 6));
        let moved_same = cursor.advance(Position::at(ts(10), 5));
        let moved_forward = cursor.advance(Position::at(ts(10), 6));

        // Assert
        assert!(!moved_back);
        assert!(!moved_same);
        assert!(moved_forward);
        assert_eq!(cursor.position(), Some(Position::at(ts(10), 6)));
    }

    #[test]
    fn should_seed_only_when_unset() {
        let mut cursor = Cursor::new();

        assert!(cursor.seed_if_unset(ts(5)));
        assert!(!cursor.seed_if_unset(ts(50)));
        assert_eq!(cursor.last_received_at(), Some(ts(5)));
    }

    #[test]
    fn should_admit_entries_after_seed_with_equal_timestamp() {
        let mut cursor = Cursor::new();
        cursor.seed_if_unset(ts(5));

        assert!(cursor.admits(&entry(1, 5)));
        assert!(!cursor.admits(&entry(1, 4)));
    }

    #[test]
    fn should_reject_already_processed_entries() {
        let mut cursor = Cursor::new();
        cursor.advance(entry(3, 5).position());

        assert!(!cursor.admits(&entry(3, 5)));
        assert!(!cursor.admits(&entry(2, 5)));
        assert!(cursor.admits(&entry(4, 5)));
    }
}
