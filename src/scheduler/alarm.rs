//! Daily alarms that fire at most once per calendar day.
//!
//! [`AlarmScheduler`] is evaluated by calling [`AlarmScheduler::tick`] as
//! often as the host likes. Matching is on local hour and minute only, and a
//! fire record per `(alarm, date)` keeps repeated ticks within the same
//! minute from firing twice. Records are dropped when the date changes,
//! either through [`AlarmScheduler::on_midnight`] or when `tick` notices the
//! date moved on its own (suspend/resume across midnight).
//!
//! Alarms whose time has already passed when they are added are seeded as
//! fired for today so they never fire retroactively.

use crate::error::{Result, ThymeError};
use crate::sink::NotificationSink;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A daily trigger point, `HH:MM` in host local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlarmTime {
    hour: u8,
    minute: u8,
}

impl AlarmTime {
    /// Build from hour (0-23) and minute (0-59).
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::InvalidAlarmTime`] when either part is out of range.
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(ThymeError::InvalidAlarmTime(format!("{hour}:{minute:02}")));
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    /// Hour and minute of a wall-clock instant; seconds are discarded.
    pub fn of(now: &NaiveDateTime) -> Self {
        Self {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
        }
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.hour)
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.minute)
    }

    /// Minutes since midnight.
    pub fn minutes_of_day(&self) -> u32 {
        self.hour() * 60 + self.minute()
    }

    /// This time of day on `date`.
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        let time = NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN);
        date.and_time(time)
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for AlarmTime {
    type Err = ThymeError;

    /// Accepts `H:MM` and `HH:MM`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ThymeError::InvalidAlarmTime(s.to_owned());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for AlarmTime {
    type Error = ThymeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AlarmTime> for String {
    fn from(value: AlarmTime) -> Self {
        value.to_string()
    }
}

/// Marker that `alarm` has fired (or was seeded as passed) on `date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmFireRecord {
    pub alarm: AlarmTime,
    pub date: NaiveDate,
}

/// Owns the configured alarm set and today's fire records.
pub struct AlarmScheduler {
    alarms: BTreeSet<AlarmTime>,
    fired: HashSet<AlarmFireRecord>,
    current_date: Option<NaiveDate>,
    sink: Arc<dyn NotificationSink>,
}

impl AlarmScheduler {
    /// Create an empty scheduler that reports fires to `sink`.
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            alarms: BTreeSet::new(),
            fired: HashSet::new(),
            current_date: None,
            sink,
        }
    }

    /// Add every time in `times`, seeding against `now`.
    ///
    /// Duplicates are rejected one by one exactly as [`Self::add_alarm`]
    /// would reject them; the rejected times are returned.
    pub fn load_alarms(
        &mut self,
        times: impl IntoIterator<Item = AlarmTime>,
        now: NaiveDateTime,
    ) -> Vec<AlarmTime> {
        let mut rejected = Vec::new();
        for time in times {
            if let Err(e) = self.add_alarm(time, now) {
                warn!(alarm = %time, error = %e, "skipping configured alarm");
                rejected.push(time);
            }
        }
        rejected
    }

    /// Add one alarm.
    ///
    /// If `time` is strictly earlier than `now`'s hour and minute it is
    /// recorded as already fired today. An alarm for the current minute stays
    /// armed and fires on the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::DuplicateAlarm`] if an equal time exists; the
    /// set is left unchanged.
    pub fn add_alarm(&mut self, time: AlarmTime, now: NaiveDateTime) -> Result<()> {
        if self.alarms.contains(&time) {
            return Err(ThymeError::DuplicateAlarm(time));
        }
        self.roll_over_if_needed(now);
        self.alarms.insert(time);
        if time < AlarmTime::of(&now) {
            self.fired.insert(AlarmFireRecord {
                alarm: time,
                date: now.date(),
            });
            debug!(alarm = %time, "alarm already passed today, armed from tomorrow");
        }
        Ok(())
    }

    /// Remove one alarm together with any fire record for it.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::AlarmNotFound`] if `time` is not configured.
    pub fn remove_alarm(&mut self, time: AlarmTime) -> Result<()> {
        if !self.alarms.remove(&time) {
            return Err(ThymeError::AlarmNotFound(time));
        }
        self.fired.retain(|record| record.alarm != time);
        Ok(())
    }

    /// Evaluate alarms against `now`.
    ///
    /// Returns the alarm that fired on this call, if any. Safe to call any
    /// number of times per minute.
    pub fn tick(&mut self, now: NaiveDateTime) -> Option<AlarmTime> {
        self.roll_over_if_needed(now);

        let current = AlarmTime::of(&now);
        if !self.alarms.contains(&current) {
            return None;
        }
        let record = AlarmFireRecord {
            alarm: current,
            date: now.date(),
        };
        if !self.fired.insert(record) {
            return None;
        }
        info!(alarm = %current, "alarm fired");
        self.sink.on_alarm_fired(current);
        Some(current)
    }

    /// Start a new calendar day: drop fire records from earlier dates.
    ///
    /// Idempotent; calling it twice for the same date is harmless.
    pub fn on_midnight(&mut self, now: NaiveDateTime) {
        let today = now.date();
        let before = self.fired.len();
        self.fired.retain(|record| record.date >= today);
        self.current_date = Some(today);
        debug!(
            date = %today,
            cleared = before - self.fired.len(),
            "alarm fire records reset for new day"
        );
    }

    /// Next time an alarm will fire, as seen from `now`.
    ///
    /// The first armed alarm from the current minute onward today, otherwise
    /// the earliest alarm tomorrow.
    pub fn next_alarm(&self, now: NaiveDateTime) -> Option<(AlarmTime, NaiveDateTime)> {
        let today = now.date();
        let current = AlarmTime::of(&now);
        let later_today = self.alarms.range(current..).find(|time| {
            !self.fired.contains(&AlarmFireRecord {
                alarm: **time,
                date: today,
            })
        });
        if let Some(time) = later_today {
            return Some((*time, time.on(today)));
        }
        let first = self.alarms.first()?;
        let tomorrow = today.checked_add_days(Days::new(1))?;
        Some((*first, first.on(tomorrow)))
    }

    /// Configured alarms in time-of-day order.
    pub fn alarms(&self) -> Vec<AlarmTime> {
        self.alarms.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    /// Whether `time` has a fire record for `date`.
    pub fn has_fired(&self, time: AlarmTime, date: NaiveDate) -> bool {
        self.fired.contains(&AlarmFireRecord { alarm: time, date })
    }

    fn roll_over_if_needed(&mut self, now: NaiveDateTime) {
        match self.current_date {
            Some(date) if date == now.date() => {}
            Some(_) => self.on_midnight(now),
            None => self.current_date = Some(now.date()),
        }
    }
}
