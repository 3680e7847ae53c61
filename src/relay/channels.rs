//! Destination channel resolution
//!
//! Resolves (and lazily provisions) the general, warnings and errors
//! destinations of a community. Explicit destination ids bypass provisioning.
//! Provisioning failures degrade to an unset destination, never to an error
//! for the tailing path.

use super::classifier::Destination;
use super::sink::DestinationId;
use crate::utils::retry::{with_retry, Retryable};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Community (guild) identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommunityId(String);

impl CommunityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProvisionError {
    #[error("community {0} not found")]
    UnknownCommunity(CommunityId),
    #[error("missing permission: {0}")]
    PermissionDenied(String),
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("upstream error: {status} {body}")]
    Upstream { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl ProvisionError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProvisionError::RateLimited { .. }
                | ProvisionError::Upstream { .. }
                | ProvisionError::Transport(_)
        )
    }
}

impl Retryable for ProvisionError {
    fn is_retryable(&self) -> bool {
        ProvisionError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ProvisionError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Looks up or creates named destinations
///
/// Must be idempotent per `(community, name)`: an existing destination with
/// the exact name is returned instead of creating a new one.
#[async_trait]
pub trait ChannelProvisioner: Send + Sync {
    async fn ensure_destination(
        &self,
        community: &CommunityId,
        group: &str,
        name: &str,
        topic: &str,
    ) -> Result<DestinationId, ProvisionError>;
}

/// Resolved destination handles; unset means "drop silently"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSet {
    pub general: Option<DestinationId>,
    pub warnings: Option<DestinationId>,
    pub errors: Option<DestinationId>,
}

impl ChannelSet {
    pub fn get(&self, destination: Destination) -> Option<&DestinationId> {
        match destination {
            Destination::General => self.general.as_ref(),
            Destination::Warn => self.warnings.as_ref(),
            Destination::Error => self.errors.as_ref(),
            Destination::None => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.general.is_some() && self.warnings.is_some() && self.errors.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.general.is_none() && self.warnings.is_none() && self.errors.is_none()
    }
}

/// Names, grouping and explicit overrides of the three destinations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    pub group: String,
    pub general_name: String,
    pub warnings_name: String,
    pub errors_name: String,
    /// Explicit ids; a set field is used as-is and never provisioned
    pub overrides: ChannelSet,
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self {
            group: "Console Logs".to_string(),
            general_name: "console-logs".to_string(),
            warnings_name: "console-warnings".to_string(),
            errors_name: "console-errors".to_string(),
            overrides: ChannelSet::default(),
        }
    }
}

/// Resolves a [`ChannelSet`] for a community
pub struct ChannelResolver {
    provisioner: Arc<dyn ChannelProvisioner>,
    layout: ChannelLayout,
}

impl ChannelResolver {
    pub fn new(provisioner: Arc<dyn ChannelProvisioner>, layout: ChannelLayout) -> Self {
        Self {
            provisioner,
            layout,
        }
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Resolve all three destinations, creating missing ones
    ///
    /// Individual failures leave that destination unset. An error is only
    /// returned when the community itself cannot be found.
    #[instrument(skip(self, community), fields(community = %community))]
    pub async fn resolve(&self, community: &CommunityId) -> Result<ChannelSet, ProvisionError> {
        let layout = &self.layout;

        let general = self
            .resolve_one(
                community,
                layout.overrides.general.as_ref(),
                &layout.general_name,
                "All console output",
            )
            .await?;
        let errors = self
            .resolve_one(
                community,
                layout.overrides.errors.as_ref(),
                &layout.errors_name,
                "ERROR level console output",
            )
            .await?;
        let warnings = self
            .resolve_one(
                community,
                layout.overrides.warnings.as_ref(),
                &layout.warnings_name,
                "WARN level console output",
            )
            .await?;

        let set = ChannelSet {
            general,
            warnings,
            errors,
        };

        info!(
            general = ?set.general,
            warnings = ?set.warnings,
            errors = ?set.errors,
            complete = set.is_complete(),
            "Resolved console channels"
        );

        Ok(set)
    }

    async fn resolve_one(
        &self,
        community: &CommunityId,
        explicit: Option<&DestinationId>,
        name: &str,
        topic: &str,
    ) -> Result<Option<DestinationId>, ProvisionError> {
        if let Some(id) = explicit {
            return Ok(Some(id.clone()));
        }

        let result = with_retry(move || {
            self.provisioner
                .ensure_destination(community, &self.layout.group, name, topic)
        })
        .await;

        match result {
            Ok(id) => Ok(Some(id)),
            Err(e @ ProvisionError::UnknownCommunity(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, channel = %name, "Failed to provision channel, leaving it unset");
                Ok(None)
            }
        }
    }
}
