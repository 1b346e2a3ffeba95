//! Per-feed configuration with sensible defaults.
//!
//! Each struct deserializes from its own TOML section of the kiosk config
//! file. Missing fields fall back to [`Default`].

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Open-Meteo forecast settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Whether the weather feed is registered at all.
    pub enabled: bool,
    /// Latitude of the forecast location.
    pub latitude: f64,
    /// Longitude of the forecast location.
    pub longitude: f64,
    /// IANA timezone used by the API to decide what "today" is.
    pub timezone: String,
    /// `fahrenheit` or `celsius`.
    pub temperature_unit: String,
    /// API base URL. Overridable for tests and self-hosted instances.
    pub endpoint: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            latitude: 32.7767,
            longitude: -96.7970,
            timezone: "America/Chicago".to_owned(),
            temperature_unit: "fahrenheit".to_owned(),
            endpoint: "https://api.open-meteo.com/v1/forecast".to_owned(),
        }
    }
}

impl WeatherConfig {
    /// Validates coordinates and unit.
    pub fn validate(&self) -> Result<(), FetchError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(FetchError::Config(format!(
                "weather latitude {} out of range",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(FetchError::Config(format!(
                "weather longitude {} out of range",
                self.longitude
            )));
        }
        if self.temperature_unit != "fahrenheit" && self.temperature_unit != "celsius" {
            return Err(FetchError::Config(format!(
                "weather temperature_unit must be fahrenheit or celsius, got {}",
                self.temperature_unit
            )));
        }
        if self.timezone.trim().is_empty() {
            return Err(FetchError::Config("weather timezone must not be empty".into()));
        }
        Ok(())
    }
}

/// Google Calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Whether the calendar feed is registered at all.
    pub enabled: bool,
    /// Calendar to list; `primary` is the account's main calendar.
    pub calendar_id: String,
    /// Maximum events shown.
    pub max_events: usize,
    /// OAuth access token. Usually supplied through the environment rather
    /// than written to the config file.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// API base URL.
    pub endpoint: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            calendar_id: "primary".to_owned(),
            max_events: 3,
            access_token: None,
            endpoint: "https://www.googleapis.com/calendar/v3".to_owned(),
        }
    }
}

impl CalendarConfig {
    /// Validates the calendar settings.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.calendar_id.trim().is_empty() {
            return Err(FetchError::Config("calendar_id must not be empty".into()));
        }
        if self.max_events == 0 {
            return Err(FetchError::Config(
                "calendar max_events must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Discord channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether the chat feed is registered at all.
    pub enabled: bool,
    /// Bot token. Usually supplied through the environment.
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,
    /// Channel to read.
    pub channel_id: String,
    /// Maximum messages shown.
    pub max_messages: usize,
    /// API base URL.
    pub endpoint: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: None,
            channel_id: String::new(),
            max_messages: 5,
            endpoint: "https://discord.com/api/v10".to_owned(),
        }
    }
}

impl ChatConfig {
    /// Validates the chat settings. Only meaningful when enabled.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.channel_id.trim().is_empty() {
            return Err(FetchError::Config("chat channel_id must be set".into()));
        }
        if self.max_messages == 0 || self.max_messages > 100 {
            return Err(FetchError::Config(
                "chat max_messages must be between 1 and 100".into(),
            ));
        }
        Ok(())
    }
}

/// Local background image rotation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Whether the background feed is registered at all.
    pub enabled: bool,
    /// Directory scanned for images.
    pub directory: PathBuf,
    /// Accepted file extensions, compared case-insensitively.
    pub extensions: Vec<String>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("backgrounds"),
            extensions: ["jpg", "jpeg", "png", "gif", "bmp"]
                .iter()
                .map(|e| (*e).to_owned())
                .collect(),
        }
    }
}

impl BackgroundConfig {
    /// Validates the background settings.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.extensions.is_empty() {
            return Err(FetchError::Config(
                "background extensions must not be empty".into(),
            ));
        }
        Ok(())
    }
}
