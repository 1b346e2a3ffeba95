//! Startup wiring for the kiosk.
//!
//! [`Kiosk`] owns the orchestrator and the alarm scheduler and connects them
//! to the sink:
//!
//! - a `clock` task ticks the alarm scheduler and delivers the clock face
//! - one task per enabled feed
//! - a midnight timer that resets alarm fire records
//! - the quiet-hours monitor, when configured
//! - a spoken calendar summary a short while after each alarm

use crate::clock::TimeSource;
use crate::config::{CLOCK_TASK, ThymeConfig};
use crate::display::{self, DisplayPowerMonitor, DisplayWindow};
use crate::error::{Result, ThymeError};
use crate::scheduler::alarm::{AlarmScheduler, AlarmTime};
use crate::scheduler::orchestrator::{TaskStatus, TriggerOutcome, UpdateOrchestrator};
use crate::sink::{FeedPayload, NotificationSink};
use chrono::{NaiveDateTime, NaiveTime};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thyme_feeds::{
    BackgroundProvider, CalendarEvent, CalendarProvider, ChatProvider, DataProvider, FetchError,
    StaticToken, WeatherProvider, speech_summary,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type SharedAlarms = Arc<Mutex<AlarmScheduler>>;
type LastCalendar = Arc<Mutex<Option<Vec<CalendarEvent>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Speaks today's events a fixed delay after an alarm.
struct Announcer {
    sink: Arc<dyn NotificationSink>,
    last_calendar: LastCalendar,
    delay: Duration,
    cancel: CancellationToken,
}

impl Announcer {
    fn schedule(self: &Arc<Self>, alarm: AlarmTime) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = this.cancel.cancelled() => {
                    debug!(alarm = %alarm, "announcement cancelled");
                }
                _ = tokio::time::sleep(this.delay) => {
                    let text = {
                        let events = lock(&this.last_calendar);
                        speech_summary(events.as_deref().unwrap_or_default())
                    };
                    info!(alarm = %alarm, "announcing today's events");
                    this.sink.speak(&text);
                }
            }
        });
    }
}

/// The assembled kiosk core.
pub struct Kiosk {
    config: ThymeConfig,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn TimeSource>,
    alarms: SharedAlarms,
    last_calendar: LastCalendar,
    orchestrator: UpdateOrchestrator,
    cancel: CancellationToken,
    background: Vec<JoinHandle<()>>,
    started: bool,
}

impl Kiosk {
    /// Validate `config`, seed the alarms and register the clock task.
    ///
    /// Feeds are added separately with [`Self::add_configured_feeds`] or
    /// [`Self::add_feed`].
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::Config`] for invalid configuration.
    pub fn new(
        config: ThymeConfig,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        config.validate()?;

        let mut scheduler = AlarmScheduler::new(Arc::clone(&sink));
        let rejected = scheduler.load_alarms(config.alarms.iter().copied(), clock.now());
        if !rejected.is_empty() {
            warn!(count = rejected.len(), "duplicate alarms in config ignored");
        }
        info!(alarms = scheduler.len(), "alarms loaded");

        let cancel = CancellationToken::new();
        let alarms: SharedAlarms = Arc::new(Mutex::new(scheduler));
        let last_calendar: LastCalendar = Arc::new(Mutex::new(None));
        let announcer = config.announce.enabled.then(|| {
            Arc::new(Announcer {
                sink: Arc::clone(&sink),
                last_calendar: Arc::clone(&last_calendar),
                delay: Duration::from_millis(config.announce.delay_ms),
                cancel: cancel.child_token(),
            })
        });

        let mut orchestrator = UpdateOrchestrator::new(config.fetch_timeout())?;
        {
            let clock = Arc::clone(&clock);
            let alarms = Arc::clone(&alarms);
            let sink = Arc::clone(&sink);
            orchestrator.register_task(
                CLOCK_TASK,
                config.refresh.clock(),
                move || {
                    let now = clock.now();
                    let mut scheduler = lock(&alarms);
                    if let Some(fired) = scheduler.tick(now) {
                        if let Some(announcer) = &announcer {
                            announcer.schedule(fired);
                        }
                    }
                    let next = scheduler.next_alarm(now).map(|(time, _)| time);
                    std::future::ready(Ok::<_, FetchError>(display::clock_face(now, next)))
                },
                move |refresh| sink.on_data_update(CLOCK_TASK, refresh.map(FeedPayload::from)),
            )?;
        }

        Ok(Self {
            config,
            sink,
            clock,
            alarms,
            last_calendar,
            orchestrator,
            cancel,
            background: Vec::new(),
            started: false,
        })
    }

    /// Register one feed at the interval configured for its kind.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::Config`] if a task with the same name exists.
    pub fn add_feed<P>(&mut self, provider: Arc<P>) -> Result<()>
    where
        P: DataProvider + 'static,
        FeedPayload: From<P::Output>,
    {
        let name = provider.name();
        let interval = self.config.refresh.for_feed(provider.kind());
        let sink = Arc::clone(&self.sink);
        let last_calendar = Arc::clone(&self.last_calendar);
        self.orchestrator.register_provider(provider, interval, move |refresh| {
            let refresh = refresh.map(FeedPayload::from);
            if let Some(FeedPayload::Calendar(events)) = refresh.value() {
                *lock(&last_calendar) = Some(events.clone());
            }
            sink.on_data_update(name, refresh);
        })?;
        info!(
            feed = name,
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "feed registered"
        );
        Ok(())
    }

    /// Build and register every feed enabled in the config.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::Config`] if a provider rejects its settings or
    /// the HTTP client cannot be built.
    pub fn add_configured_feeds(&mut self) -> Result<()> {
        let client = thyme_feeds::http::build_client(Some(self.config.fetch_timeout()))
            .map_err(config_error)?;

        if self.config.weather.enabled {
            let provider = WeatherProvider::new(self.config.weather.clone(), client.clone())
                .map_err(config_error)?;
            self.add_feed(Arc::new(provider))?;
        }
        if self.config.calendar.enabled {
            let token = self.config.calendar.access_token.clone().unwrap_or_default();
            if token.is_empty() {
                warn!("calendar enabled without an access token, it will report unauthorized");
            }
            let provider = CalendarProvider::new(
                self.config.calendar.clone(),
                client.clone(),
                Arc::new(StaticToken::new(token)),
            )
            .map_err(config_error)?;
            self.add_feed(Arc::new(provider))?;
        }
        if self.config.chat.enabled {
            let provider =
                ChatProvider::new(self.config.chat.clone(), client).map_err(config_error)?;
            self.add_feed(Arc::new(provider))?;
        }
        if self.config.background.enabled {
            let provider =
                BackgroundProvider::new(self.config.background.clone()).map_err(config_error)?;
            self.add_feed(Arc::new(provider))?;
        }
        Ok(())
    }

    /// Start refreshing, the midnight timer and the quiet-hours monitor.
    ///
    /// A kiosk runs once; it cannot be restarted after [`Self::stop`].
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::AlreadyRunning`] on a second call.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(ThymeError::AlreadyRunning);
        }
        self.started = true;
        self.orchestrator.start()?;

        self.background.push(tokio::spawn(midnight_loop(
            Arc::clone(&self.clock),
            Arc::clone(&self.alarms),
            self.cancel.child_token(),
        )));

        if let Some(window) = DisplayWindow::from_config(&self.config.display) {
            let monitor = DisplayPowerMonitor::new(
                window,
                Arc::clone(&self.clock),
                Arc::clone(&self.sink),
                self.cancel.child_token(),
            );
            self.background.push(tokio::spawn(monitor.run()));
        }

        info!(tasks = ?self.orchestrator.task_names(), "kiosk started");
        Ok(())
    }

    /// Stop everything. Pending announcements are dropped.
    pub fn stop(&mut self) {
        self.orchestrator.stop();
        self.cancel.cancel();
        for handle in self.background.drain(..) {
            handle.abort();
        }
    }

    /// Fetch every task now (manual reload).
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::NotRunning`] when not started.
    pub fn reload(&self) -> Result<Vec<(String, TriggerOutcome)>> {
        let outcomes = self.orchestrator.trigger_all()?;
        info!(tasks = outcomes.len(), "manual reload");
        Ok(outcomes)
    }

    /// Add an alarm, seeded against the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::DuplicateAlarm`] if it already exists.
    pub fn add_alarm(&self, time: AlarmTime) -> Result<()> {
        lock(&self.alarms).add_alarm(time, self.clock.now())
    }

    /// # Errors
    ///
    /// Returns [`ThymeError::AlarmNotFound`] if it does not exist.
    pub fn remove_alarm(&self, time: AlarmTime) -> Result<()> {
        lock(&self.alarms).remove_alarm(time)
    }

    pub fn alarms(&self) -> Vec<AlarmTime> {
        lock(&self.alarms).alarms()
    }

    /// Alarm panel text sized by `display.alarm_summary_lines`.
    pub fn alarm_summary(&self) -> String {
        display::alarm_summary(&self.alarms(), self.config.display.alarm_summary_lines)
    }

    /// Next alarm and when it fires.
    pub fn next_alarm(&self) -> Option<(AlarmTime, NaiveDateTime)> {
        lock(&self.alarms).next_alarm(self.clock.now())
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.orchestrator.statuses()
    }

    pub fn task_names(&self) -> Vec<String> {
        self.orchestrator.task_names()
    }
}

impl Drop for Kiosk {
    fn drop(&mut self) {
        self.stop();
    }
}

fn config_error(e: FetchError) -> ThymeError {
    ThymeError::Config(e.to_string())
}

/// Time left until the next local midnight, at least one second.
fn until_midnight(now: NaiveDateTime) -> Duration {
    now.date()
        .succ_opt()
        .map(|tomorrow| tomorrow.and_time(NaiveTime::MIN))
        .and_then(|midnight| (midnight - now).to_std().ok())
        .unwrap_or(Duration::from_secs(60))
        .max(Duration::from_secs(1))
}

async fn midnight_loop(clock: Arc<dyn TimeSource>, alarms: SharedAlarms, cancel: CancellationToken) {
    loop {
        let wait = until_midnight(clock.now());
        debug!(secs = wait.as_secs(), "next midnight reset scheduled");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {
                lock(&alarms).on_midnight(clock.now());
                info!("new day, alarms re-armed");
            }
        }
    }
}
