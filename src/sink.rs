//! Output side of the core.
//!
//! The renderer, sound player and speech engine live behind
//! [`NotificationSink`]. The core only calls into it and never reads anything
//! back.

use crate::scheduler::alarm::AlarmTime;
use crate::scheduler::refresh::Refresh;
use serde::Serialize;
use thyme_feeds::{BackgroundImage, CalendarEvent, ChatMessage, WeatherReport};
use tokio::sync::mpsc;

/// Time and date strings for the clock face.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockFace {
    /// `HH:MM:SS`.
    pub time: String,
    /// `Friday, March 14, 2025`.
    pub date: String,
    /// Next alarm as `HH:MM`, if any are configured.
    pub next_alarm: Option<String>,
}

/// Value delivered for each kind of refresh task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "feed", content = "data", rename_all = "snake_case")]
pub enum FeedPayload {
    Clock(ClockFace),
    Calendar(Vec<CalendarEvent>),
    Weather(WeatherReport),
    Chat(Vec<ChatMessage>),
    Background(BackgroundImage),
}

impl From<ClockFace> for FeedPayload {
    fn from(value: ClockFace) -> Self {
        Self::Clock(value)
    }
}

impl From<Vec<CalendarEvent>> for FeedPayload {
    fn from(value: Vec<CalendarEvent>) -> Self {
        Self::Calendar(value)
    }
}

impl From<WeatherReport> for FeedPayload {
    fn from(value: WeatherReport) -> Self {
        Self::Weather(value)
    }
}

impl From<Vec<ChatMessage>> for FeedPayload {
    fn from(value: Vec<ChatMessage>) -> Self {
        Self::Chat(value)
    }
}

impl From<BackgroundImage> for FeedPayload {
    fn from(value: BackgroundImage) -> Self {
        Self::Background(value)
    }
}

/// Receiver of everything the kiosk core produces.
///
/// Calls arrive from independent tasks in no particular cross-task order.
/// Implementations must return promptly.
pub trait NotificationSink: Send + Sync {
    /// A refresh task finished a cycle.
    fn on_data_update(&self, task: &str, refresh: Refresh<FeedPayload>);

    /// An alarm fired.
    fn on_alarm_fired(&self, time: AlarmTime);

    /// Speak `text` aloud.
    fn speak(&self, _text: &str) {}

    /// The display should be blanked (`true`) or restored (`false`).
    fn on_display_power(&self, _hidden: bool) {}
}

/// One sink call, as data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SinkEvent {
    DataUpdate {
        task: String,
        #[serde(flatten)]
        refresh: Refresh<FeedPayload>,
    },
    AlarmFired {
        time: AlarmTime,
    },
    Speak {
        text: String,
    },
    DisplayPower {
        hidden: bool,
    },
}

/// Forwards every call as a [`SinkEvent`] over an unbounded channel.
///
/// A closed receiver is not an error; events are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        Self { tx }
    }

    /// A sink paired with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: SinkEvent) {
        let _ = self.tx.send(event);
    }
}

impl NotificationSink for ChannelSink {
    fn on_data_update(&self, task: &str, refresh: Refresh<FeedPayload>) {
        self.send(SinkEvent::DataUpdate {
            task: task.to_owned(),
            refresh,
        });
    }

    fn on_alarm_fired(&self, time: AlarmTime) {
        self.send(SinkEvent::AlarmFired { time });
    }

    fn speak(&self, text: &str) {
        self.send(SinkEvent::Speak {
            text: text.to_owned(),
        });
    }

    fn on_display_power(&self, hidden: bool) {
        self.send(SinkEvent::DisplayPower { hidden });
    }
}
