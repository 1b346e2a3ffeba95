//! Discord channel feed over the REST API.
//!
//! Reads the channel history with a bot token instead of holding a gateway
//! connection open, so it fits the same poll-on-interval model as the other
//! feeds.

use crate::config::ChatConfig;
use crate::error::FetchError;
use crate::http;
use crate::provider::DataProvider;
use crate::types::{ChatMessage, FeedKind};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use url::Url;

const MAX_TEXT_CHARS: usize = 100;
const TRUNCATED_CHARS: usize = 97;

/// Recent messages from one channel, newest first.
pub struct ChatProvider {
    config: ChatConfig,
    client: reqwest::Client,
}

impl ChatProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Config`] if the channel is unset or the limit
    /// is out of range.
    pub fn new(config: ChatConfig, client: reqwest::Client) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self { config, client })
    }

    /// Channel history URL.
    pub fn request_url(&self) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.config.endpoint)
            .map_err(|e| FetchError::Config(format!("invalid chat endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| FetchError::Config("chat endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["channels", self.config.channel_id.as_str(), "messages"]);
        // Over-fetch so skipped messages do not leave the list short.
        let limit = (self.config.max_messages * 2).min(100);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        Ok(url)
    }
}

#[async_trait]
impl DataProvider for ChatProvider {
    type Output = Vec<ChatMessage>;

    async fn fetch(&self) -> Result<Vec<ChatMessage>, FetchError> {
        let token = self
            .config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FetchError::Unauthorized("chat bot token is not configured".into()))?;
        let url = self.request_url()?;
        let request = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {token}"));
        let body = http::fetch_text("chat", request).await?;
        parse_messages(&body, self.config.max_messages)
    }

    fn kind(&self) -> FeedKind {
        FeedKind::Chat
    }
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: String,
    timestamp: String,
    author: RawAuthor,
}

#[derive(Deserialize)]
struct RawAuthor {
    username: String,
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

/// Parse a channel history body, keeping at most `max` displayable messages.
///
/// Bot authors, empty bodies and `!` commands are dropped. Bodies longer than
/// 100 characters are cut to 97 plus `...`.
pub fn parse_messages(body: &str, max: usize) -> Result<Vec<ChatMessage>, FetchError> {
    let raw: Vec<RawMessage> = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("chat response: {e}")))?;

    let mut messages = Vec::with_capacity(max.min(raw.len()));
    for msg in raw {
        if messages.len() >= max {
            break;
        }
        let text = msg.content.trim();
        if msg.author.bot || text.is_empty() || text.starts_with('!') {
            continue;
        }
        let posted_at = DateTime::parse_from_rfc3339(&msg.timestamp)
            .map_err(|e| FetchError::Parse(format!("chat timestamp {:?}: {e}", msg.timestamp)))?;
        let sender = msg
            .author
            .global_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(msg.author.username);
        messages.push(ChatMessage {
            sender,
            text: truncate_text(text),
            posted_at,
        });
    }
    Ok(messages)
}

fn truncate_text(text: &str) -> String {
    if text.chars().count() > MAX_TEXT_CHARS {
        let cut: String = text.chars().take(TRUNCATED_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_owned()
    }
}
