//! Thyme: the timing core of a wall-mounted kiosk clock.
//!
//! The crate keeps a clock face ticking, fires daily alarms, and refreshes a
//! handful of data feeds (calendar, weather, chat, background imagery) on
//! independent schedules. Everything it produces goes out through a
//! [`NotificationSink`]; rendering, sound and speech live on the other side.
//!
//! # Architecture
//!
//! - **Scheduler**: [`UpdateOrchestrator`] runs one periodic task per feed
//!   and [`AlarmScheduler`] tracks which alarms have fired today
//! - **Feeds**: providers from the `thyme-feeds` crate, one per data source
//! - **Kiosk**: [`Kiosk`] wires config, scheduler, feeds and sink together
//! - **Display**: quiet-hours blanking and clock face formatting

pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod kiosk;
pub mod scheduler;
pub mod sink;
pub mod thyme_dirs;

#[cfg(test)]
pub(crate) mod test_utils;

pub use clock::{ManualClock, SystemClock, TimeSource};
pub use config::ThymeConfig;
pub use error::{Result, ThymeError};
pub use kiosk::Kiosk;
pub use scheduler::{
    AlarmFireRecord, AlarmScheduler, AlarmTime, Refresh, TaskStatus, TriggerOutcome,
    UpdateOrchestrator,
};
pub use sink::{ChannelSink, ClockFace, FeedPayload, NotificationSink, SinkEvent};
