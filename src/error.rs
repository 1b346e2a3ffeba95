//! Error types for the kiosk core.
//!
//! Fetch failures are not represented here: they stay inside a refresh task
//! as [`thyme_feeds::FetchError`] and reach the sink as data.

use crate::scheduler::alarm::AlarmTime;

/// Errors surfaced directly to callers of the core.
#[derive(Debug, thiserror::Error)]
pub enum ThymeError {
    /// Bad startup configuration or task registration. Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// An alarm with the same HH:MM is already configured.
    #[error("alarm {0} already exists")]
    DuplicateAlarm(AlarmTime),

    /// No alarm with that HH:MM is configured.
    #[error("alarm {0} not found")]
    AlarmNotFound(AlarmTime),

    /// Text that does not parse as an `H:MM` / `HH:MM` time of day.
    #[error("invalid alarm time: {0}")]
    InvalidAlarmTime(String),

    /// No refresh task is registered under that name.
    #[error("unknown task: {0}")]
    UnknownTask(String),

    /// The orchestrator has not been started or was stopped.
    #[error("orchestrator is not running")]
    NotRunning,

    /// `start()` was called twice.
    #[error("orchestrator is already running")]
    AlreadyRunning,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ThymeError>;
