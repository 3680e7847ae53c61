use crate::config::ConfigError;

/// Startup failures that stop the process
///
/// Runtime failures of the relay and monitor never surface here; they are
/// logged and degrade the affected feature.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
