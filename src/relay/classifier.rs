//! Entry classification and single-line rendering
//!
//! Pure functions: no network or persistence side effects.

use super::entry::{LogEntry, LogLevel};
use chrono::SecondsFormat;
use std::collections::HashSet;

/// Maximum number of message characters kept in a rendered line
pub const MAX_MESSAGE_CHARS: usize = 1950;

/// Appended to a message that was cut at [`MAX_MESSAGE_CHARS`]
pub const TRUNCATION_MARKER: &str = "...";

/// Levels eligible for forwarding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingPolicy {
    forward_levels: HashSet<LogLevel>,
}

impl Default for ForwardingPolicy {
    fn default() -> Self {
        Self::new([LogLevel::Error, LogLevel::Warn])
    }
}

impl ForwardingPolicy {
    pub fn new(levels: impl IntoIterator<Item = LogLevel>) -> Self {
        Self {
            forward_levels: levels.into_iter().collect(),
        }
    }

    /// Parse a comma separated level list such as `ERROR,WARN`
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(LogLevel::from),
        )
    }

    pub fn forwards(&self, level: &LogLevel) -> bool {
        self.forward_levels.contains(level)
    }

    /// Forwarded levels in a stable order, for logging and status output
    pub fn levels(&self) -> Vec<String> {
        let mut levels: Vec<String> = self
            .forward_levels
            .iter()
            .map(|l| l.as_str().to_string())
            .collect();
        levels.sort();
        levels
    }
}

/// Destination category of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    General,
    Warn,
    Error,
    /// Not forwarded; the entry still advances the cursor
    None,
}

impl Destination {
    /// Category an entry belongs to, ignoring policy
    pub fn for_level(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => Destination::Error,
            LogLevel::Warn => Destination::Warn,
            _ => Destination::General,
        }
    }
}

/// Result of classifying one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub destination: Destination,
    pub text: String,
}

impl Classification {
    pub fn is_forwarded(&self) -> bool {
        self.destination != Destination::None
    }
}

pub fn classify(entry: &LogEntry, policy: &ForwardingPolicy) -> Classification {
    let destination = if policy.forwards(&entry.level) {
        Destination::for_level(&entry.level)
    } else {
        Destination::None
    };

    Classification {
        destination,
        text: format_entry(entry),
    }
}

/// Render `[receivedAt] [serverTag] [LEVEL] message`
pub fn format_entry(entry: &LogEntry) -> String {
    format!(
        "[{}] [{}] [{}] {}",
        entry
            .received_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        entry.server_tag,
        entry.level,
        truncate_message(&entry.message)
    )
}

fn truncate_message(message: &str) -> String {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((cut, _)) => format!("{}{}", &message[..cut], TRUNCATION_MARKER),
        None => message.to_string(),
    }
}
