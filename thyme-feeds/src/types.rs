//! Feed identifiers and the values each feed produces.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The four kinds of external data the kiosk shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Today's calendar events.
    Calendar,
    /// Daily forecast.
    Weather,
    /// Recent chat channel messages.
    Chat,
    /// Rotating background image.
    Background,
}

impl FeedKind {
    /// Stable task name used by the orchestrator and the event stream.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Weather => "weather",
            Self::Chat => "chat",
            Self::Background => "background",
        }
    }

    /// Returns all feed kinds.
    pub fn all() -> &'static [FeedKind] {
        &[Self::Calendar, Self::Weather, Self::Chat, Self::Background]
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Text shown in the weather slot before any forecast has been fetched.
pub const WEATHER_PLACEHOLDER: &str = "--° / --°";

/// Today's forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Forecast high for today.
    pub temp_max: f64,
    /// Forecast low for today.
    pub temp_min: f64,
    /// WMO weather interpretation code.
    pub weather_code: u16,
    /// Unit the temperatures are expressed in (`fahrenheit` / `celsius`).
    pub unit: String,
}

impl WeatherReport {
    /// High / low line, e.g. `72° / 55°`.
    pub fn display_text(&self) -> String {
        format!(
            "{}° / {}°",
            self.temp_max.round() as i64,
            self.temp_min.round() as i64
        )
    }

    /// Icon name for the weather code.
    pub fn icon(&self) -> &'static str {
        icon_for_code(self.weather_code)
    }

    /// Human-readable description of the weather code.
    pub fn description(&self) -> &'static str {
        describe_code(self.weather_code)
    }
}

/// Map a WMO weather code onto one of the bundled icon names.
pub fn icon_for_code(code: u16) -> &'static str {
    match code {
        0 | 1 => "clear",
        2 => "partly_cloudy",
        3 => "cloudy",
        45 | 48 => "fog",
        51 | 53 | 55 | 56 | 57 | 61 | 63 | 65 | 66 | 67 | 80 | 81 | 82 => "rain",
        71 | 73 | 75 | 77 | 85 | 86 => "snow",
        95 | 96 | 99 => "thunderstorm",
        _ => "clear",
    }
}

/// WMO weather code description.
pub fn describe_code(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown weather",
    }
}

/// When a calendar event starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "at", rename_all = "snake_case")]
pub enum EventStart {
    /// All-day event.
    AllDay,
    /// Timed event, in the offset the calendar reported.
    At(DateTime<FixedOffset>),
}

/// Maximum location length shown next to an event.
const LOCATION_MAX_CHARS: usize = 30;

/// A single event on today's calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Event summary.
    pub title: String,
    /// Start time.
    pub start: EventStart,
    /// Free-form location, if any.
    pub location: Option<String>,
}

impl CalendarEvent {
    /// `9:30 AM - Standup @ Room 4` style line.
    pub fn display_line(&self) -> String {
        let mut line = format!("{} - {}", self.time_label(), self.title);
        if let Some(location) = self.short_location() {
            line.push_str(" @ ");
            line.push_str(&location);
        }
        line
    }

    /// Line without the location, for speech.
    pub fn speech_line(&self) -> String {
        format!("{} - {}", self.time_label(), self.title)
    }

    fn time_label(&self) -> String {
        match &self.start {
            EventStart::AllDay => "All day".to_owned(),
            EventStart::At(at) => at.format("%-I:%M %p").to_string(),
        }
    }

    /// First comma-separated part of the location, truncated for display.
    fn short_location(&self) -> Option<String> {
        let location = self.location.as_deref()?;
        let head = location.split(',').next().unwrap_or_default().trim();
        if head.is_empty() {
            return None;
        }
        if head.chars().count() > LOCATION_MAX_CHARS {
            let cut: String = head.chars().take(LOCATION_MAX_CHARS).collect();
            Some(format!("{cut}..."))
        } else {
            Some(head.to_owned())
        }
    }
}

/// Sentence spoken after an alarm, listing today's events.
pub fn speech_summary(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return "There are no upcoming events today.".to_owned();
    }
    let mut text = String::from("Here are your upcoming events: ");
    for event in events {
        text.push_str(&event.speech_line());
        text.push_str(". ");
    }
    text
}

/// A message from the configured chat channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the author.
    pub sender: String,
    /// Message body, already truncated for display.
    pub text: String,
    /// When the message was posted.
    pub posted_at: DateTime<FixedOffset>,
}

impl ChatMessage {
    /// `14:05 Alice: see you soon` style line, first name only.
    pub fn display_line(&self) -> String {
        let first = self.sender.split_whitespace().next().unwrap_or(&self.sender);
        format!("{} {}: {}", self.posted_at.format("%H:%M"), first, self.text)
    }
}

/// A background image chosen for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundImage {
    /// Absolute or config-relative path to the image file.
    pub path: PathBuf,
    /// How many candidate images were available when this one was picked.
    pub pool_size: usize,
}
