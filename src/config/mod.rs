pub mod app_config;
pub mod database;

pub use app_config::{AppConfig, ConfigError, MonitorConfig, RelayConfig};
pub use database::establish_connection;
