//! Notification sink seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque handle of a notification destination (a channel id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(String);

impl DestinationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("destination {0} does not exist")]
    UnknownDestination(DestinationId),
    #[error("not allowed to post to destination {0}")]
    Forbidden(DestinationId),
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("sink rejected message: {status} {body}")]
    Rejected { status: u16, body: String },
    #[error("sink transport failure: {0}")]
    Transport(String),
    #[error("sink call timed out after {0:?}")]
    Timeout(Duration),
}

/// Accepts rendered text for one destination
///
/// Delivery is best-effort; callers log failures and move on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, destination: &DestinationId, text: &str) -> Result<(), SinkError>;
}
