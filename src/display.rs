//! Screen-side helpers: quiet hours, alarm summary text and the clock face.
//!
//! [`DisplayPowerMonitor`] polls the clock once a minute and tells the sink
//! to blank or restore the screen. It only emits on a *transition*, not
//! repeatedly while the screen stays in one state.

use crate::clock::TimeSource;
use crate::config::DisplayConfig;
use crate::scheduler::alarm::AlarmTime;
use crate::sink::{ClockFace, NotificationSink};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Poll interval for quiet-hours checks.
const POLL_INTERVAL_SECS: u64 = 60;

/// Period during which the screen is dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWindow {
    pub off: AlarmTime,
    pub on: AlarmTime,
}

impl DisplayWindow {
    /// Quiet hours from config; `None` unless both ends are set.
    pub fn from_config(config: &DisplayConfig) -> Option<Self> {
        Some(Self {
            off: config.off?,
            on: config.on?,
        })
    }

    /// Whether the screen should be dark at `time`.
    ///
    /// `off > on` spans midnight (23:00 to 07:00). `off == on` never hides.
    pub fn should_hide(&self, time: AlarmTime) -> bool {
        let now = time.minutes_of_day();
        let off = self.off.minutes_of_day();
        let on = self.on.minutes_of_day();
        if off > on {
            now >= off || now < on
        } else {
            off <= now && now < on
        }
    }
}

/// Fixed-height alarm panel text.
///
/// Lists up to `max` alarms under an `Alarms:` header and pads with blank
/// lines so the panel always has `max` lines below the header.
pub fn alarm_summary(alarms: &[AlarmTime], max: usize) -> String {
    let mut summary = String::from("Alarms:");
    if alarms.is_empty() {
        summary.push_str("\n(no alarms)");
    }
    for alarm in alarms.iter().take(max) {
        summary.push('\n');
        summary.push_str(&alarm.to_string());
    }
    let mut lines = summary.matches('\n').count();
    while lines < max {
        summary.push_str("\n ");
        lines += 1;
    }
    summary
}

/// Clock face strings for `now`.
pub fn clock_face(now: NaiveDateTime, next_alarm: Option<AlarmTime>) -> ClockFace {
    ClockFace {
        time: now.format("%H:%M:%S").to_string(),
        date: now.format("%A, %B %d, %Y").to_string(),
        next_alarm: next_alarm.map(|t| t.to_string()),
    }
}

/// Blanks and restores the screen around quiet hours.
pub struct DisplayPowerMonitor {
    window: DisplayWindow,
    clock: Arc<dyn TimeSource>,
    sink: Arc<dyn NotificationSink>,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl DisplayPowerMonitor {
    pub fn new(
        window: DisplayWindow,
        clock: Arc<dyn TimeSource>,
        sink: Arc<dyn NotificationSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            window,
            clock,
            sink,
            cancel,
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
        }
    }

    /// Override the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run until cancelled. Checks once immediately, then every interval.
    pub async fn run(self) {
        let mut hidden = false;
        let mut ticker = tokio::time::interval(self.poll_interval);
        info!(off = %self.window.off, on = %self.window.on, "display power monitor started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("display power monitor stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let now = AlarmTime::of(&self.clock.now());
                    let should_hide = self.window.should_hide(now);
                    if should_hide != hidden {
                        if should_hide {
                            info!(at = %now, "quiet hours: display off");
                        } else {
                            info!(at = %now, "quiet hours over: display on");
                        }
                        self.sink.on_display_power(should_hide);
                        hidden = should_hide;
                    }
                }
            }
        }
    }
}
