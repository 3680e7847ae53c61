//! Discord bot client
//!
//! Posts console lines to text channels and finds or creates the console
//! channels of a guild. Authenticates with a bot token.

use super::dto::{
    channel_kind, AllowedMentions, CreateChannel, CreateMessage, GuildChannel, RateLimited,
};
use crate::relay::{
    ChannelProvisioner, CommunityId, DestinationId, NotificationSink, ProvisionError, SinkError,
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Hard limit of a message body
pub const MAX_CONTENT_CHARS: usize = 2000;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DiscordClient {
    api_base: String,
    token: String,
    client: Client,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            client: Client::new(),
        }
    }

    /// Point the client at another REST base (a proxy or a local fake)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn list_channels(
        &self,
        community: &CommunityId,
    ) -> Result<Vec<GuildChannel>, ProvisionError> {
        let url = format!("{}/guilds/{}/channels", self.api_base, community);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(|e| ProvisionError::Transport(e.to_string()))?;

        let response = check_provision_response(community, response).await?;
        response
            .json::<Vec<GuildChannel>>()
            .await
            .map_err(|e| ProvisionError::InvalidResponse(e.to_string()))
    }

    async fn create_channel(
        &self,
        community: &CommunityId,
        payload: &CreateChannel<'_>,
    ) -> Result<GuildChannel, ProvisionError> {
        let url = format!("{}/guilds/{}/channels", self.api_base, community);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .json(payload)
            .send()
            .await
            .map_err(|e| ProvisionError::Transport(e.to_string()))?;

        let response = check_provision_response(community, response).await?;
        let created = response
            .json::<GuildChannel>()
            .await
            .map_err(|e| ProvisionError::InvalidResponse(e.to_string()))?;

        info!(
            community = %community,
            channel = %payload.name,
            id = %created.id,
            "Created Discord channel"
        );
        Ok(created)
    }

    /// Create the grouping category; `None` when it cannot be created, so
    /// the channel is created ungrouped
    async fn create_category(
        &self,
        community: &CommunityId,
        group: &str,
    ) -> Result<Option<String>, ProvisionError> {
        let payload = CreateChannel {
            name: group,
            kind: channel_kind::GUILD_CATEGORY,
            parent_id: None,
            topic: None,
        };

        match self.create_channel(community, &payload).await {
            Ok(category) => Ok(Some(category.id)),
            Err(e @ ProvisionError::UnknownCommunity(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, category = %group, "Failed to create category, creating channel without it");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl NotificationSink for DiscordClient {
    async fn send(&self, destination: &DestinationId, text: &str) -> Result<(), SinkError> {
        let url = format!("{}/channels/{}/messages", self.api_base, destination);
        let payload = CreateMessage {
            content: clamp_content(text),
            allowed_mentions: AllowedMentions::default(),
        };

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .json(&payload)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(destination = %destination, "Discord message sent");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(sink_error(destination, status, body))
    }
}

#[async_trait]
impl ChannelProvisioner for DiscordClient {
    #[instrument(skip(self, community, topic), fields(community = %community))]
    async fn ensure_destination(
        &self,
        community: &CommunityId,
        group: &str,
        name: &str,
        topic: &str,
    ) -> Result<DestinationId, ProvisionError> {
        let channels = self.list_channels(community).await?;
        let existing_category = find_channel(&channels, group, channel_kind::GUILD_CATEGORY, None);

        if let Some(existing) = find_channel(
            &channels,
            name,
            channel_kind::GUILD_TEXT,
            existing_category.map(|c| c.id.as_str()),
        ) {
            debug!(channel = %name, id = %existing.id, "Found existing Discord channel");
            return Ok(DestinationId::new(existing.id.clone()));
        }

        let category = match existing_category {
            Some(existing) => Some(existing.id.clone()),
            None => self.create_category(community, group).await?,
        };

        let created = self
            .create_channel(
                community,
                &CreateChannel {
                    name,
                    kind: channel_kind::GUILD_TEXT,
                    parent_id: category.as_deref(),
                    topic: Some(topic),
                },
            )
            .await?;

        Ok(DestinationId::new(created.id))
    }
}

/// Channel of `kind` named exactly `name`
///
/// With a `parent`, a match under that parent wins over a match elsewhere.
fn find_channel<'a>(
    channels: &'a [GuildChannel],
    name: &str,
    kind: u8,
    parent: Option<&str>,
) -> Option<&'a GuildChannel> {
    let mut candidates = channels
        .iter()
        .filter(|c| c.kind == kind && c.name.as_deref() == Some(name));

    match parent {
        None => candidates.next(),
        Some(parent) => {
            let all: Vec<_> = candidates.collect();
            all.iter()
                .find(|c| c.parent_id.as_deref() == Some(parent))
                .or_else(|| all.first())
                .copied()
        }
    }
}

fn clamp_content(text: &str) -> &str {
    match text.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

fn retry_after(body: &str) -> Duration {
    serde_json::from_str::<RateLimited>(body)
        .ok()
        .and_then(|r| Duration::try_from_secs_f64(r.retry_after).ok())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

fn sink_error(destination: &DestinationId, status: StatusCode, body: String) -> SinkError {
    match status {
        StatusCode::NOT_FOUND => SinkError::UnknownDestination(destination.clone()),
        StatusCode::FORBIDDEN => SinkError::Forbidden(destination.clone()),
        StatusCode::TOO_MANY_REQUESTS => SinkError::RateLimited {
            retry_after: retry_after(&body),
        },
        _ => SinkError::Rejected {
            status: status.as_u16(),
            body,
        },
    }
}

async fn check_provision_response(
    community: &CommunityId,
    response: Response,
) -> Result<Response, ProvisionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(community = %community, status = %status, body = %body, "Discord provisioning call failed");
    Err(provision_error(community, status, body))
}

fn provision_error(community: &CommunityId, status: StatusCode, body: String) -> ProvisionError {
    match status {
        StatusCode::NOT_FOUND => ProvisionError::UnknownCommunity(community.clone()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProvisionError::PermissionDenied(body),
        StatusCode::TOO_MANY_REQUESTS => ProvisionError::RateLimited {
            retry_after: retry_after(&body),
        },
        s if s.is_server_error() => ProvisionError::Upstream {
            status: s.as_u16(),
            body,
        },
        s => ProvisionError::InvalidResponse(format!("{} - {}", s, body)),
    }
}
