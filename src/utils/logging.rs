//! Logging setup
//!
//! Every event is written as JSON twice: to stdout for the process
//! supervisor and to a daily rolling `relay.log.YYYY-MM-DD` file.

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::{self, time::UtcTime, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_FILTER: &str = "info,console_relay=debug";
pub const LOG_FILE_PREFIX: &str = "relay.log";
const DEFAULT_LOG_DIR: &str = "logs";

/// Where and how much to log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub directory: String,
    /// `EnvFilter` directives
    pub filter: String,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `LOG_DIR` and `RUST_LOG`; blank values fall back to the defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            directory: non_blank("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
            filter: non_blank("RUST_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_string()),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|e| {
            eprintln!("Invalid log filter {:?} ({}), using {}", self.filter, e, DEFAULT_FILTER);
            EnvFilter::new(DEFAULT_FILTER)
        })
    }
}

fn json_layer<S, W>(writer: W) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_current_span(true)
        .flatten_event(false)
        .with_ansi(false)
        .with_writer(writer)
}

/// Install the global subscriber
///
/// Keep the returned guard alive in `main`; dropping it flushes and stops
/// the file writer. A subscriber installed earlier (tests, embedding) is
/// left in place.
pub fn init_logging(settings: &LogSettings) -> WorkerGuard {
    let file_appender = rolling::daily(&settings.directory, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    if tracing::dispatcher::has_been_set() {
        return guard;
    }

    let installed = tracing_subscriber::registry()
        .with(settings.env_filter())
        .with(json_layer(std::io::stdout))
        .with(json_layer(file_writer))
        .try_init();
    if let Err(err) = installed {
        eprintln!("Failed to initialize tracing: {}", err);
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_directory_and_filter() {
        let settings = LogSettings::from_lookup(|_| None);

        assert_eq!(settings.directory, "logs");
        assert_eq!(settings.filter, DEFAULT_FILTER);
        assert!(EnvFilter::try_new(&settings.filter).is_ok());
    }

    #[test]
    fn should_read_overrides_and_ignore_blank_values() {
        // Arrange
        let lookup = |key: &str| match key {
            "LOG_DIR" => Some("/var/log/relay".to_string()),
            "RUST_LOG" => Some("  ".to_string()),
            _ => None,
        };

        // Act
        let settings = LogSettings::from_lookup(lookup);

        // Assert
        assert_eq!(settings.directory, "/var/log/relay");
        assert_eq!(settings.filter, DEFAULT_FILTER);
    }
}
