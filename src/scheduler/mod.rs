//! Timing core of the kiosk.
//!
//! [`UpdateOrchestrator`] drives the periodic feed refreshes and the clock
//! tick; [`AlarmScheduler`] decides when daily alarms fire. Neither reads
//! files or the environment.

pub mod alarm;
pub mod orchestrator;
pub mod refresh;

pub use alarm::{AlarmFireRecord, AlarmScheduler, AlarmTime};
pub use orchestrator::{TaskStatus, TriggerOutcome, UpdateOrchestrator};
pub use refresh::Refresh;
