//! Discord REST v10 payloads used by the relay

use serde::{Deserialize, Serialize};

/// Channel type ids
pub mod channel_kind {
    pub const GUILD_TEXT: u8 = 0;
    pub const GUILD_CATEGORY: u8 = 4;
}

/// `POST /channels/{id}/messages`
#[derive(Debug, Serialize)]
pub struct CreateMessage<'a> {
    pub content: &'a str,
    /// Never ping anyone from forwarded console output
    pub allowed_mentions: AllowedMentions,
}

#[derive(Debug, Default, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

/// Entry of `GET /guilds/{id}/channels`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuildChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// `POST /guilds/{id}/channels`
#[derive(Debug, Serialize)]
pub struct CreateChannel<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<&'a str>,
}

/// Body of a 429 response
#[derive(Debug, Deserialize)]
pub struct RateLimited {
    pub retry_after: f64,
}
