//! Shared test helpers.

use crate::scheduler::alarm::AlarmTime;
use crate::scheduler::refresh::Refresh;
use crate::sink::{FeedPayload, NotificationSink};
use std::sync::Mutex;

/// Sink that keeps every call for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<(String, Refresh<FeedPayload>)>>,
    alarms: Mutex<Vec<AlarmTime>>,
    spoken: Mutex<Vec<String>>,
    power: Mutex<Vec<bool>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<(String, Refresh<FeedPayload>)> {
        self.updates.lock().expect("updates lock").clone()
    }

    pub fn alarms(&self) -> Vec<AlarmTime> {
        self.alarms.lock().expect("alarms lock").clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().expect("spoken lock").clone()
    }

    pub fn power(&self) -> Vec<bool> {
        self.power.lock().expect("power lock").clone()
    }
}

impl NotificationSink for RecordingSink {
    fn on_data_update(&self, task: &str, refresh: Refresh<FeedPayload>) {
        self.updates
            .lock()
            .expect("updates lock")
            .push((task.to_owned(), refresh));
    }

    fn on_alarm_fired(&self, time: AlarmTime) {
        self.alarms.lock().expect("alarms lock").push(time);
    }

    fn speak(&self, text: &str) {
        self.spoken.lock().expect("spoken lock").push(text.to_owned());
    }

    fn on_display_power(&self, hidden: bool) {
        self.power.lock().expect("power lock").push(hidden);
    }
}
