//! Kiosk configuration.
//!
//! Loaded once at startup from TOML; every section falls back to its
//! defaults so a partial file is fine. Secrets and location can also come
//! from the environment (see [`ThymeConfig::apply_env_overrides`]).

use crate::error::{Result, ThymeError};
use crate::scheduler::alarm::AlarmTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thyme_feeds::{BackgroundConfig, CalendarConfig, ChatConfig, FeedKind, WeatherConfig};

/// Name of the built-in clock task.
pub const CLOCK_TASK: &str = "clock";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThymeConfig {
    /// Daily alarms as `HH:MM`.
    pub alarms: Vec<AlarmTime>,
    /// Upper bound for any single feed fetch.
    pub fetch_timeout_ms: u64,
    /// Per-task refresh intervals.
    pub refresh: RefreshConfig,
    /// Quiet hours and alarm summary layout.
    pub display: DisplayConfig,
    /// Post-alarm spoken announcement.
    pub announce: AnnounceConfig,
    pub weather: WeatherConfig,
    pub calendar: CalendarConfig,
    pub chat: ChatConfig,
    pub background: BackgroundConfig,
}

impl Default for ThymeConfig {
    fn default() -> Self {
        Self {
            alarms: Vec::new(),
            fetch_timeout_ms: 10_000,
            refresh: RefreshConfig::default(),
            display: DisplayConfig::default(),
            announce: AnnounceConfig::default(),
            weather: WeatherConfig::default(),
            calendar: CalendarConfig::default(),
            chat: ChatConfig::default(),
            background: BackgroundConfig::default(),
        }
    }
}

/// Refresh interval per task, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub clock_ms: u64,
    pub calendar_ms: u64,
    pub weather_ms: u64,
    pub chat_ms: u64,
    pub background_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            clock_ms: 1_000,
            calendar_ms: 10_000,
            weather_ms: 3_600_000,
            chat_ms: 10_000,
            background_ms: 30_000,
        }
    }
}

impl RefreshConfig {
    /// Interval for a feed.
    pub fn for_feed(&self, kind: FeedKind) -> Duration {
        let ms = match kind {
            FeedKind::Calendar => self.calendar_ms,
            FeedKind::Weather => self.weather_ms,
            FeedKind::Chat => self.chat_ms,
            FeedKind::Background => self.background_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn clock(&self) -> Duration {
        Duration::from_millis(self.clock_ms)
    }

    fn entries(&self) -> [(&'static str, u64); 5] {
        [
            ("clock_ms", self.clock_ms),
            ("calendar_ms", self.calendar_ms),
            ("weather_ms", self.weather_ms),
            ("chat_ms", self.chat_ms),
            ("background_ms", self.background_ms),
        ]
    }
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Time the screen goes dark. Both `off` and `on` must be set for quiet
    /// hours to apply.
    pub off: Option<AlarmTime>,
    /// Time the screen comes back.
    pub on: Option<AlarmTime>,
    /// Lines in the alarm summary panel.
    pub alarm_summary_lines: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            off: None,
            on: None,
            alarm_summary_lines: 3,
        }
    }
}

/// Spoken calendar summary after an alarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnounceConfig {
    pub enabled: bool,
    /// Pause between the alarm and the announcement.
    pub delay_ms: u64,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 2_000,
        }
    }
}

impl ThymeConfig {
    /// Reject values the core cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::Config`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_ms == 0 {
            return Err(ThymeError::Config("fetch_timeout_ms must be greater than 0".into()));
        }
        for (name, ms) in self.refresh.entries() {
            if ms == 0 {
                return Err(ThymeError::Config(format!(
                    "refresh.{name} must be greater than 0"
                )));
            }
        }
        if self.display.alarm_summary_lines == 0 {
            return Err(ThymeError::Config(
                "display.alarm_summary_lines must be greater than 0".into(),
            ));
        }
        let feed_error = |e: thyme_feeds::FetchError| ThymeError::Config(e.to_string());
        if self.weather.enabled {
            self.weather.validate().map_err(feed_error)?;
        }
        if self.calendar.enabled {
            self.calendar.validate().map_err(feed_error)?;
        }
        if self.chat.enabled {
            self.chat.validate().map_err(feed_error)?;
        }
        if self.background.enabled {
            self.background.validate().map_err(feed_error)?;
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Fill secrets and location from the environment.
    ///
    /// `lookup` is normally `|k| std::env::var(k).ok()`. Recognised keys:
    /// `THYME_CALENDAR_TOKEN`, `THYME_CHAT_TOKEN`, `THYME_CHAT_CHANNEL_ID`,
    /// `THYME_LATITUDE`, `THYME_LONGITUDE`, `THYME_TIMEZONE`. Empty values
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::Config`] if a coordinate is not a number.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("THYME_CALENDAR_TOKEN") {
            self.calendar.access_token = Some(token);
        }
        if let Some(token) = get("THYME_CHAT_TOKEN") {
            self.chat.bot_token = Some(token);
        }
        if let Some(channel) = get("THYME_CHAT_CHANNEL_ID") {
            self.chat.channel_id = channel;
        }
        if let Some(lat) = get("THYME_LATITUDE") {
            self.weather.latitude = parse_coordinate("THYME_LATITUDE", &lat)?;
        }
        if let Some(lon) = get("THYME_LONGITUDE") {
            self.weather.longitude = parse_coordinate("THYME_LONGITUDE", &lon)?;
        }
        if let Some(tz) = get("THYME_TIMEZONE") {
            self.weather.timezone = tz;
        }
        Ok(())
    }

    /// Resolve a relative background directory against `base`.
    pub fn resolve_relative_paths(&mut self, base: &Path) {
        if self.background.directory.is_relative() {
            self.background.directory = base.join(&self.background.directory);
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ThymeError::Config(e.to_string()))
    }

    /// Load from `path` if it exists, otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// Tokens are never written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ThymeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file path, see [`crate::thyme_dirs::config_file`].
    pub fn default_config_path() -> PathBuf {
        crate::thyme_dirs::config_file()
    }
}

fn parse_coordinate(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| ThymeError::Config(format!("{key} is not a number: {value:?}")))
}
