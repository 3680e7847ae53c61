//! Console log entry as stored by the log store
//!
//! Entries are immutable once written. The relay only reads them; the store
//! assigns `id` and `received_at` at insert time.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Log level of a console entry
///
/// Parsing is case-insensitive and `WARNING` is accepted as `WARN`.
/// Unknown levels are kept verbatim (upper-cased) so they can still be
/// listed in a forwarding policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Other(String),
}

impl LogLevel {
    pub fn as_str(&self) -> &str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Other(level) => level,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LogLevel::Error)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, LogLevel::Warn)
    }
}

impl FromStr for LogLevel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_uppercase().as_str() {
            "" | "INFO" => LogLevel::Info,
            "TRACE" => LogLevel::Trace,
            "DEBUG" => LogLevel::Debug,
            "WARN" | "WARNING" => LogLevel::Warn,
            "ERROR" => LogLevel::Error,
            other => LogLevel::Other(other.to_string()),
        };
        Ok(level)
    }
}

impl From<String> for LogLevel {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(level) => level,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for LogLevel {
    fn from(value: &str) -> Self {
        LogLevel::from(value.to_string())
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_source() -> String {
    "Server".to_string()
}

fn default_server() -> String {
    "main".to_string()
}

/// A console log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Store-assigned insertion sequence
    pub id: i64,
    #[serde(default)]
    pub level: LogLevel,
    pub message: String,
    #[serde(default = "default_source")]
    pub source: String,
    /// Server identifier for multi-server setups
    #[serde(rename = "server", alias = "serverTag", default = "default_server")]
    pub server_tag: String,
    /// Timestamp reported by the game server, if any
    #[serde(rename = "minecraftTimestamp", alias = "originTimestamp", default)]
    pub origin_timestamp: Option<DateTime<Utc>>,
    /// Assigned by the store at insert time
    pub received_at: DateTime<Utc>,
}

impl LogEntry {
    /// Position of this entry in store order
    pub fn position(&self) -> Position {
        Position::at(self.received_at, self.id)
    }
}

/// Point in store order: `(received_at, id)`
///
/// `received_at` alone is only non-decreasing, so the store sequence breaks
/// ties. A position without an id sorts before every entry sharing its
/// timestamp, which is what a cursor seeded from a wall-clock instant needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub received_at: DateTime<Utc>,
    pub id: Option<i64>,
}

impl Position {
    pub fn at(received_at: DateTime<Utc>, id: i64) -> Self {
        Self {
            received_at,
            id: Some(id),
        }
    }

    /// Position just before anything received in the second of `instant`
    ///
    /// Rounded down to the whole second so rows whose receipt time was
    /// stored without fractions are not skipped.
    pub fn instant(instant: DateTime<Utc>) -> Self {
        Self {
            received_at: instant.trunc_subsecs(0),
            id: None,
        }
    }

    /// Whether `entry` sorts strictly after this position
    pub fn precedes(&self, entry: &LogEntry) -> bool {
        *self < entry.position()
    }
}
