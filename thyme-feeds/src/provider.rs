//! Trait definition for pluggable data feeds.
//!
//! Each feed (calendar, weather, chat, background) implements
//! [`DataProvider`] so the orchestrator can schedule them uniformly.

use crate::error::FetchError;
use crate::types::FeedKind;
use async_trait::async_trait;

/// A pluggable source of one kind of display data.
///
/// Implementors own their request construction and response parsing and
/// reduce every failure to a [`FetchError`]; `fetch` never panics on bad
/// input. Calling `fetch` repeatedly is always safe. Providers keep no
/// last-known-good state of their own; retention is the orchestrator's job.
///
/// All implementations must be `Send + Sync` so they can be shared with the
/// task that drives them.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Value produced by a successful fetch.
    type Output: Clone + Send + Sync + 'static;

    /// Fetch the current value.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the source is unreachable, rejects our
    /// credentials, or returns something we cannot interpret.
    async fn fetch(&self) -> Result<Self::Output, FetchError>;

    /// Which feed this provider serves.
    fn kind(&self) -> FeedKind;

    /// Task name used for scheduling. Defaults to [`FeedKind::name`].
    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Opaque source of OAuth access tokens for the calendar feed.
///
/// The consent flow and token refresh live outside this crate; the calendar
/// provider only asks for a bearer token before each request.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Unauthorized`] when no valid token is available.
    async fn access_token(&self) -> Result<String, FetchError>;
}

/// A fixed token, typically read from configuration or the environment.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Result<String, FetchError> {
        if self.0.trim().is_empty() {
            return Err(FetchError::Unauthorized("access token is empty".into()));
        }
        Ok(self.0.clone())
    }
}
