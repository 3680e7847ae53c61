//! Environment configuration
//!
//! Parsing goes through a lookup function so it can be exercised without
//! touching the process environment; [`AppConfig::from_env`] plugs in
//! `std::env::var`.

use crate::discord::client::DEFAULT_API_BASE;
use crate::monitor::health_monitor::{DEFAULT_FRESHNESS_MINUTES, DEFAULT_MONITOR_INTERVAL};
use crate::relay::pull::{DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL};
use crate::relay::{ChannelLayout, ChannelSet, CommunityId, DestinationId, ForwardingPolicy};
use std::str::FromStr;
use std::time::Duration;

const MAX_PAGE_SIZE: usize = 500;
const DEFAULT_PLUGIN_API_PORT: &str = "25577";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub db_schema_update: bool,
    pub discord_token: Option<String>,
    pub discord_api_base: String,
    pub relay: RelayConfig,
    pub monitor: MonitorConfig,
}

/// Console forwarding settings
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub guild_id: Option<CommunityId>,
    pub layout: ChannelLayout,
    pub policy: ForwardingPolicy,
    pub poll_interval: Duration,
    pub page_size: usize,
    pub send_timeout: Duration,
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub base_urls: Vec<String>,
    pub interval: Duration,
    pub freshness_minutes: i64,
    pub alert_channel: Option<DestinationId>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let server_port = match value(&lookup, "SERVER_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => 8080,
        };

        let db_schema_update = value(&lookup, "DB_SCHEMA_UPDATE")
            .map(|raw| {
                raw.parse::<bool>().unwrap_or_else(|_| {
                    tracing::warn!(
                        "Invalid DB_SCHEMA_UPDATE value, defaulting to false. Use 'true' or 'false'."
                    );
                    false
                })
            })
            .unwrap_or(false);

        Ok(Self {
            server_port,
            database_url: value(&lookup, "DATABASE_URL"),
            db_schema_update,
            discord_token: value(&lookup, "DISCORD_TOKEN"),
            discord_api_base: value(&lookup, "DISCORD_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            relay: RelayConfig::from_lookup(&lookup)?,
            monitor: MonitorConfig::from_lookup(&lookup)?,
        })
    }

    /// Why the relay cannot run, if it cannot
    ///
    /// A missing store, token or destination is a no-op for the relay, not
    /// a startup error.
    pub fn relay_disabled_reason(&self) -> Option<&'static str> {
        if self.database_url.is_none() {
            Some("DATABASE_URL not configured")
        } else if self.discord_token.is_none() {
            Some("DISCORD_TOKEN not configured")
        } else if self.relay.guild_id.is_none() && self.relay.layout.overrides.is_empty() {
            Some("neither CONSOLE_GUILD_ID nor a console channel id is configured")
        } else {
            None
        }
    }
}

impl RelayConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ChannelLayout::default();

        let shared = value(&lookup, "CONSOLE_CHANNEL_ID").map(DestinationId::new);
        let explicit = |key: &str| value(&lookup, key).map(DestinationId::new).or_else(|| shared.clone());

        let layout = ChannelLayout {
            group: value(&lookup, "CONSOLE_CATEGORY_NAME").unwrap_or(defaults.group),
            general_name: value(&lookup, "CONSOLE_GENERAL_CHANNEL_NAME")
                .unwrap_or(defaults.general_name),
            warnings_name: value(&lookup, "CONSOLE_WARN_CHANNEL_NAME")
                .unwrap_or(defaults.warnings_name),
            errors_name: value(&lookup, "CONSOLE_ERROR_CHANNEL_NAME")
                .unwrap_or(defaults.errors_name),
            overrides: ChannelSet {
                general: explicit("CONSOLE_GENERAL_CHANNEL_ID"),
                warnings: explicit("CONSOLE_WARN_CHANNEL_ID"),
                errors: explicit("CONSOLE_ERROR_CHANNEL_ID"),
            },
        };

        let policy = value(&lookup, "CONSOLE_FORWARD_LEVELS")
            .map(|raw| ForwardingPolicy::parse(&raw))
            .unwrap_or_default();

        let poll_secs: u64 = number(&lookup, "CONSOLE_POLL_INTERVAL", DEFAULT_POLL_INTERVAL.as_secs())?;
        let page_size: usize = number(&lookup, "CONSOLE_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let send_timeout_secs: u64 = number(&lookup, "CONSOLE_SEND_TIMEOUT_SECS", 10)?;
        let grace_secs: u64 = number(&lookup, "SHUTDOWN_GRACE_SECS", 5)?;

        Ok(Self {
            guild_id: value(&lookup, "CONSOLE_GUILD_ID").map(CommunityId::new),
            layout,
            policy,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            send_timeout: Duration::from_secs(send_timeout_secs.max(1)),
            shutdown_grace: Duration::from_secs(grace_secs),
        })
    }
}

impl MonitorConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Set but empty disables the monitor
        let base_urls = match lookup("MONITOR_BASE_URLS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
                .collect(),
            None => {
                let port = value(&lookup, "API_PORT")
                    .unwrap_or_else(|| DEFAULT_PLUGIN_API_PORT.to_string());
                vec![format!("http://127.0.0.1:{}", port)]
            }
        };

        let interval_secs: u64 = number(&lookup, "MONITOR_INTERVAL", DEFAULT_MONITOR_INTERVAL.as_secs())?;
        let freshness_minutes: i64 =
            number(&lookup, "MONITOR_FRESHNESS_MINUTES", DEFAULT_FRESHNESS_MINUTES)?;

        let alert_channel = value(&lookup, "MONITOR_ALERT_CHANNEL_ID")
            .or_else(|| value(&lookup, "CONSOLE_CHANNEL_ID"))
            .or_else(|| value(&lookup, "COMMAND_LOG_CHANNEL_ID"))
            .map(DestinationId::new);

        Ok(Self {
            base_urls,
            interval: Duration::from_secs(interval_secs.max(5)),
            freshness_minutes: freshness_minutes.max(1),
            alert_channel,
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.base_urls.is_empty()
    }
}

/// Trimmed, non-empty value
fn value(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value(lookup, key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(String),
    #[error("Invalid number for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::LogLevel;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn should_apply_defaults_when_unset() {
        // Act
        let config = AppConfig::from_lookup(lookup(&[])).expect("defaults parse");

        // Assert
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.discord_api_base, DEFAULT_API_BASE);
        assert_eq!(config.relay.poll_interval, Duration::from_secs(10));
        assert_eq!(config.relay.page_size, 100);
        assert!(config.relay.policy.forwards(&LogLevel::Error));
        assert!(config.relay.policy.forwards(&LogLevel::Warn));
        assert!(!config.relay.policy.forwards(&LogLevel::Info));
        assert_eq!(config.relay.layout, ChannelLayout::default());
        assert_eq!(config.monitor.base_urls, vec!["http://127.0.0.1:25577".to_string()]);
        assert_eq!(config.monitor.interval, Duration::from_secs(30));
        assert_eq!(config.monitor.freshness_minutes, 10);
        assert_eq!(
            config.relay_disabled_reason(),
            Some("DATABASE_URL not configured")
        );
    }

    #[test]
    fn should_clamp_intervals_and_page_size() {
        let config = AppConfig::from_lookup(lookup(&[
            ("CONSOLE_POLL_INTERVAL", "0"),
            ("CONSOLE_PAGE_SIZE", "10000"),
            ("MONITOR_INTERVAL", "1"),
        ]))
        .expect("parses");

        assert_eq!(config.relay.poll_interval, Duration::from_secs(1));
        assert_eq!(config.relay.page_size, 500);
        assert_eq!(config.monitor.interval, Duration::from_secs(5));
    }

    #[test]
    fn should_let_category_ids_win_over_shared_channel_id() {
        // Arrange
        let env = lookup(&[
            ("CONSOLE_CHANNEL_ID", "100"),
            ("CONSOLE_ERROR_CHANNEL_ID", "300"),
        ]);

        // Act
        let relay = RelayConfig::from_lookup(env).expect("parses");

        // Assert
        assert_eq!(relay.layout.overrides.general, Some(DestinationId::new("100")));
        assert_eq!(relay.layout.overrides.warnings, Some(DestinationId::new("100")));
        assert_eq!(relay.layout.overrides.errors, Some(DestinationId::new("300")));
    }

    #[test]
    fn should_parse_forward_levels_case_insensitively() {
        let relay = RelayConfig::from_lookup(lookup(&[("CONSOLE_FORWARD_LEVELS", "error, info")]))
            .expect("parses");

        assert!(relay.policy.forwards(&LogLevel::Info));
        assert!(!relay.policy.forwards(&LogLevel::Warn));
    }

    #[test]
    fn should_reject_malformed_numbers() {
        let result = AppConfig::from_lookup(lookup(&[("CONSOLE_POLL_INTERVAL", "soon")]));

        assert!(matches!(
            result,
            Err(ConfigError::InvalidNumber { key: "CONSOLE_POLL_INTERVAL", .. })
        ));
    }

    #[test]
    fn should_disable_monitor_with_empty_url_list() {
        let monitor = MonitorConfig::from_lookup(lookup(&[("MONITOR_BASE_URLS", " ")])).expect("parses");

        assert!(!monitor.is_enabled());
    }

    #[test]
    fn should_fall_back_through_monitor_alert_channels() {
        let monitor = MonitorConfig::from_lookup(lookup(&[
            ("COMMAND_LOG_CHANNEL_ID", "cmd"),
            ("API_PORT", "9000"),
        ]))
        .expect("parses");

        assert_eq!(monitor.alert_channel, Some(DestinationId::new("cmd")));
        assert_eq!(monitor.base_urls, vec!["http://127.0.0.1:9000".to_string()]);
    }

    #[test]
    fn should_enable_relay_with_store_token_and_guild() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "mysql://localhost/relay"),
            ("DISCORD_TOKEN", "t"),
            ("CONSOLE_GUILD_ID", "g"),
        ]))
        .expect("parses");

        assert_eq!(config.relay_disabled_reason(), None);
        assert_eq!(config.relay.guild_id, Some(CommunityId::new("g")));
    }
}
