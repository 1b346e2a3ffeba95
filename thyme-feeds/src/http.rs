//! Shared HTTP client for the network feeds.

use crate::error::FetchError;
use std::time::Duration;

/// User-Agent sent with every feed request.
pub const USER_AGENT: &str = concat!("thyme-kiosk/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] for feed requests.
///
/// `timeout` is a transport-level ceiling; the orchestrator imposes its own
/// per-fetch deadline on top of it.
///
/// # Errors
///
/// Returns [`FetchError::Config`] if the client cannot be constructed.
pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, FetchError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))
}

/// Send a prepared request and return the body of a 2xx response.
///
/// 401/403 become [`FetchError::Unauthorized`]; other non-2xx statuses become
/// [`FetchError::Network`].
pub(crate) async fn fetch_text(
    source: &str,
    request: reqwest::RequestBuilder,
) -> Result<String, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(source, &e))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(FetchError::Unauthorized(format!("{source} returned {status}")));
    }
    if !status.is_success() {
        return Err(FetchError::Network(format!("{source} returned {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(source, &e))?;
    tracing::trace!(source, bytes = body.len(), "feed response received");
    Ok(body)
}
