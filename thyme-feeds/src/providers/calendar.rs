//! Google Calendar v3 feed listing today's events.

use crate::config::CalendarConfig;
use crate::error::FetchError;
use crate::http;
use crate::provider::{CredentialProvider, DataProvider};
use crate::types::{CalendarEvent, EventStart, FeedKind};
use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, Local, NaiveTime, SecondsFormat, TimeZone};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

/// Lists events between local midnight and the following midnight.
pub struct CalendarProvider {
    config: CalendarConfig,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl CalendarProvider {
    /// Create a provider. The token is requested fresh before every fetch.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Config`] if the configuration is invalid.
    pub fn new(
        config: CalendarConfig,
        client: reqwest::Client,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            credentials,
        })
    }

    /// Events-list URL for the given window.
    pub fn request_url(
        &self,
        window: (DateTime<FixedOffset>, DateTime<FixedOffset>),
    ) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.config.endpoint)
            .map_err(|e| FetchError::Config(format!("invalid calendar endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| FetchError::Config("calendar endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["calendars", self.config.calendar_id.as_str(), "events"]);

        let (start, end) = window;
        url.query_pairs_mut()
            .append_pair("timeMin", &start.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("timeMax", &end.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("maxResults", &self.config.max_events.to_string())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");
        Ok(url)
    }
}

/// `[midnight, next midnight)` around `now`, in `now`'s timezone.
///
/// Falls back to `now` itself for the start on days where local midnight does
/// not exist.
pub fn today_window<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let tz = now.timezone();
    let date = now.date_naive();
    let at_midnight = |d: chrono::NaiveDate| {
        tz.from_local_datetime(&d.and_time(NaiveTime::MIN))
            .earliest()
            .map(|t| t.fixed_offset())
    };
    let start = at_midnight(date).unwrap_or_else(|| now.fixed_offset());
    let end = date
        .checked_add_days(Days::new(1))
        .and_then(at_midnight)
        .unwrap_or_else(|| start + chrono::Duration::days(1));
    (start, end)
}

#[async_trait]
impl DataProvider for CalendarProvider {
    type Output = Vec<CalendarEvent>;

    async fn fetch(&self) -> Result<Vec<CalendarEvent>, FetchError> {
        let token = self.credentials.access_token().await?;
        let url = self.request_url(today_window(&Local::now()))?;
        let body = http::fetch_text("calendar", self.client.get(url).bearer_auth(token)).await?;
        let mut events = parse_events(&body)?;
        events.truncate(self.config.max_events);
        Ok(events)
    }

    fn kind(&self) -> FeedKind {
        FeedKind::Calendar
    }
}

#[derive(Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Deserialize)]
struct RawEvent {
    summary: Option<String>,
    location: Option<String>,
    start: Option<RawStart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStart {
    date_time: Option<String>,
    date: Option<String>,
}

/// Parse an events-list body. Cancelled or start-less entries are skipped.
pub fn parse_events(body: &str) -> Result<Vec<CalendarEvent>, FetchError> {
    let response: EventsResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("calendar response: {e}")))?;

    let mut events = Vec::with_capacity(response.items.len());
    for raw in response.items {
        let Some(start) = raw.start else {
            continue;
        };
        let start = match (start.date_time, start.date) {
            (Some(dt), _) => EventStart::At(DateTime::parse_from_rfc3339(&dt).map_err(|e| {
                FetchError::Parse(format!("calendar event start {dt:?}: {e}"))
            })?),
            (None, Some(_)) => EventStart::AllDay,
            (None, None) => continue,
        };
        let title = raw
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Untitled Event".to_owned());
        events.push(CalendarEvent {
            title,
            start,
            location: raw.location.filter(|l| !l.trim().is_empty()),
        });
    }
    Ok(events)
}
