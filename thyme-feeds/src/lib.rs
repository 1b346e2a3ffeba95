//! # thyme-feeds
//!
//! External data sources for the Thyme kiosk clock.
//!
//! Each feed implements [`DataProvider`] and knows only how to fetch and
//! parse one value. Scheduling, timeouts and last-known-good retention belong
//! to the caller.
//!
//! ## Feeds
//!
//! - [`WeatherProvider`]: Open-Meteo daily forecast, no key required
//! - [`CalendarProvider`]: today's Google Calendar events via a bearer token
//! - [`ChatProvider`]: recent Discord channel messages via a bot token
//! - [`BackgroundProvider`]: random image from a local directory
//!
//! ## Security
//!
//! Tokens are never serialized back to disk and never appear in error
//! messages or logs.

pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod providers;
pub mod types;

pub use config::{BackgroundConfig, CalendarConfig, ChatConfig, WeatherConfig};
pub use error::{FetchError, Result};
pub use provider::{CredentialProvider, DataProvider, StaticToken};
pub use providers::{BackgroundProvider, CalendarProvider, ChatProvider, WeatherProvider};
pub use types::{
    BackgroundImage, CalendarEvent, ChatMessage, EventStart, FeedKind, WEATHER_PLACEHOLDER,
    WeatherReport, speech_summary,
};
