//! Independently timed refresh tasks.
//!
//! Every registered task gets its own tokio timer. A tick starts the task's
//! fetch as a separate tokio task wrapped in the orchestrator's fetch
//! timeout, so a slow or hung source only ever occupies its own slot. While
//! a fetch is in flight further ticks for that task are skipped, which keeps
//! results for one task strictly ordered.
//!
//! Results reach the task's callback as [`Refresh`]: fresh on success, the
//! retained last good value on failure, or unavailable if nothing ever
//! succeeded. A fetch that panics, whether while building its future or
//! while running it, is delivered as [`FetchError::Unavailable`].
//!
//! Each [`UpdateOrchestrator::start`] opens a new run. Fetches left over
//! from a stopped run neither deliver nor hold the task's in-flight slot.
//!
//! # Manual triggers
//!
//! [`UpdateOrchestrator::trigger_now`] starts an out-of-cycle fetch without
//! touching the task's timer. A trigger that lands while a fetch is in
//! flight is coalesced into it and reported as [`TriggerOutcome::InFlight`].

use crate::error::{Result, ThymeError};
use crate::scheduler::refresh::{Refresh, is_overdue};
use chrono::{DateTime, Local};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thyme_feeds::{DataProvider, FetchError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type FetchFn<T> = Box<dyn Fn() -> BoxFuture<'static, std::result::Result<T, FetchError>> + Send + Sync>;
type ResultFn<T> = Box<dyn Fn(Refresh<T>) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a manual trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// A new fetch was started.
    Started,
    /// A fetch was already running; its result stands for this trigger.
    InFlight,
}

/// Point-in-time view of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatus {
    pub name: String,
    pub interval_ms: u64,
    pub in_flight: bool,
    /// Fetches started since registration.
    pub fetches_started: u64,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Local>>,
    /// Retained value is older than twice the interval.
    pub overdue: bool,
}

/// One start/stop cycle of the orchestrator.
#[derive(Clone)]
struct Run {
    id: u64,
    timeout: Duration,
    cancel: CancellationToken,
    /// Cleared by `stop` under the lock, so no delivery can straddle it.
    live: Arc<Mutex<bool>>,
}

/// Type-erased handle the timers work with.
trait RefreshTask: Send + Sync {
    fn name(&self) -> &str;
    fn interval(&self) -> Duration;
    /// Start a fetch unless one is running. Returns `false` when skipped.
    fn begin(self: Arc<Self>, run: &Run) -> bool;
    fn status(&self) -> TaskStatus;
}

/// The run currently fetching for a task.
struct InFlight {
    run: u64,
    cancel: CancellationToken,
}

/// Releases the in-flight slot on every exit path of a fetch.
struct InFlightGuard<T> {
    task: Arc<TypedTask<T>>,
    run: u64,
}

impl<T> InFlightGuard<T> {
    fn acquire(task: &Arc<TypedTask<T>>, run: &Run) -> Option<Self> {
        let mut slot = lock(&task.in_flight);
        if let Some(owner) = slot.as_ref() {
            if !owner.cancel.is_cancelled() {
                return None;
            }
            debug!(task = %task.name, stale_run = owner.run, "ignoring fetch from stopped run");
        }
        *slot = Some(InFlight {
            run: run.id,
            cancel: run.cancel.clone(),
        });
        Some(Self {
            task: Arc::clone(task),
            run: run.id,
        })
    }
}

impl<T> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        let mut slot = lock(&self.task.in_flight);
        if slot.as_ref().is_some_and(|owner| owner.run == self.run) {
            *slot = None;
        }
    }
}

struct LastGood<T> {
    value: T,
    at: Instant,
    wall: DateTime<Local>,
}

struct TaskState<T> {
    last_good: Option<LastGood<T>>,
    consecutive_failures: u32,
}

struct TypedTask<T> {
    name: String,
    interval: Duration,
    fetch: FetchFn<T>,
    on_result: ResultFn<T>,
    state: Mutex<TaskState<T>>,
    in_flight: Mutex<Option<InFlight>>,
    fetches: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> TypedTask<T> {
    /// Fold one outcome into the retained state.
    fn record(&self, outcome: std::result::Result<T, FetchError>) -> Refresh<T> {
        let mut state = lock(&self.state);
        match outcome {
            Ok(value) => {
                if state.consecutive_failures > 0 {
                    info!(task = %self.name, failures = state.consecutive_failures, "fetch recovered");
                }
                state.consecutive_failures = 0;
                state.last_good = Some(LastGood {
                    value: value.clone(),
                    at: Instant::now(),
                    wall: Local::now(),
                });
                Refresh::Fresh { value }
            }
            Err(error) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                warn!(
                    task = %self.name,
                    kind = error.kind(),
                    failures = state.consecutive_failures,
                    error = %error,
                    "fetch failed"
                );
                match &state.last_good {
                    Some(good) => Refresh::Stale {
                        value: good.value.clone(),
                        last_success_at: good.wall,
                        error,
                        overdue: is_overdue(good.at.elapsed(), self.interval),
                    },
                    None => Refresh::Unavailable { error },
                }
            }
        }
    }
}

impl<T: Clone + Send + Sync + 'static> RefreshTask for TypedTask<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn begin(self: Arc<Self>, run: &Run) -> bool {
        let Some(guard) = InFlightGuard::acquire(&self, run) else {
            debug!(task = %self.name, "previous fetch still in flight, skipping");
            return false;
        };
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let fetch = panic::catch_unwind(AssertUnwindSafe(|| (self.fetch)())).ok();
        if fetch.is_none() {
            warn!(task = %self.name, "fetch panicked before it started");
        }

        let run = run.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let outcome = match fetch {
                Some(fetch) => run_with_timeout(&self.name, fetch, run.timeout).await,
                None => Err(FetchError::Unavailable(format!("{} fetch panicked", self.name))),
            };
            let live = lock(&run.live);
            if !*live {
                debug!(task = %self.name, run = run.id, "orchestrator stopped, dropping result");
                return;
            }
            let refresh = self.record(outcome);
            (self.on_result)(refresh);
        });
        true
    }

    fn status(&self) -> TaskStatus {
        let in_flight = lock(&self.in_flight)
            .as_ref()
            .is_some_and(|owner| !owner.cancel.is_cancelled());
        let state = lock(&self.state);
        TaskStatus {
            name: self.name.clone(),
            interval_ms: u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            in_flight,
            fetches_started: self.fetches.load(Ordering::Relaxed),
            consecutive_failures: state.consecutive_failures,
            last_success_at: state.last_good.as_ref().map(|good| good.wall),
            overdue: state
                .last_good
                .as_ref()
                .is_some_and(|good| is_overdue(good.at.elapsed(), self.interval)),
        }
    }
}

/// Run `fetch` on its own task so a panic or a hang stays contained.
async fn run_with_timeout<T: Send + 'static>(
    name: &str,
    fetch: BoxFuture<'static, std::result::Result<T, FetchError>>,
    timeout: Duration,
) -> std::result::Result<T, FetchError> {
    let mut handle = tokio::spawn(fetch);
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => Err(FetchError::Unavailable(format!("{name} fetch task failed: {e}"))),
        Err(_) => {
            handle.abort();
            Err(FetchError::Timeout(format!(
                "{name} exceeded {}ms",
                timeout.as_millis()
            )))
        }
    }
}

/// Owns the refresh tasks and their timers.
pub struct UpdateOrchestrator {
    tasks: Vec<Arc<dyn RefreshTask>>,
    fetch_timeout: Duration,
    run: Option<Run>,
    runs: u64,
    timers: Vec<JoinHandle<()>>,
}

impl UpdateOrchestrator {
    /// Create an orchestrator that gives every fetch at most `fetch_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::Config`] for a zero timeout.
    pub fn new(fetch_timeout: Duration) -> Result<Self> {
        if fetch_timeout.is_zero() {
            return Err(ThymeError::Config("fetch timeout must be greater than 0".into()));
        }
        Ok(Self {
            tasks: Vec::new(),
            fetch_timeout,
            run: None,
            runs: 0,
            timers: Vec::new(),
        })
    }

    /// Add a periodic task.
    ///
    /// `fetch` is called once per cycle to produce that cycle's future;
    /// `on_result` receives every delivered outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::Config`] for an empty or already registered
    /// name, a zero interval, or when the orchestrator is running.
    pub fn register_task<T, F, Fut, R>(
        &mut self,
        name: impl Into<String>,
        interval: Duration,
        fetch: F,
        on_result: R,
    ) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, FetchError>> + Send + 'static,
        R: Fn(Refresh<T>) + Send + Sync + 'static,
    {
        let name = name.into();
        if self.is_running() {
            return Err(ThymeError::Config(format!(
                "cannot register task {name:?} while running"
            )));
        }
        if name.trim().is_empty() {
            return Err(ThymeError::Config("task name must not be empty".into()));
        }
        if interval.is_zero() {
            return Err(ThymeError::Config(format!(
                "task {name:?} interval must be greater than 0"
            )));
        }
        if self.tasks.iter().any(|t| t.name() == name) {
            return Err(ThymeError::Config(format!("task {name:?} is already registered")));
        }

        debug!(
            task = %name,
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "task registered"
        );
        self.tasks.push(Arc::new(TypedTask {
            name,
            interval,
            fetch: Box::new(move || fetch().boxed()),
            on_result: Box::new(on_result),
            state: Mutex::new(TaskState {
                last_good: None,
                consecutive_failures: 0,
            }),
            in_flight: Mutex::new(None),
            fetches: AtomicU64::new(0),
        }));
        Ok(())
    }

    /// Register a [`DataProvider`] under its own name.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register_task`].
    pub fn register_provider<P, R>(
        &mut self,
        provider: Arc<P>,
        interval: Duration,
        on_result: R,
    ) -> Result<()>
    where
        P: DataProvider + 'static,
        R: Fn(Refresh<P::Output>) + Send + Sync + 'static,
    {
        let name = provider.name();
        self.register_task(
            name,
            interval,
            move || {
                let provider = Arc::clone(&provider);
                async move { provider.fetch().await }
            },
            on_result,
        )
    }

    /// Start every task: one fetch right away, then one per interval.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::AlreadyRunning`] if already started.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(ThymeError::AlreadyRunning);
        }
        self.runs += 1;
        let run = Run {
            id: self.runs,
            timeout: self.fetch_timeout,
            cancel: CancellationToken::new(),
            live: Arc::new(Mutex::new(true)),
        };

        for task in &self.tasks {
            Arc::clone(task).begin(&run);

            let task = Arc::clone(task);
            let run = run.clone();
            self.timers.push(tokio::spawn(async move {
                let period = task.interval();
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = run.cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            Arc::clone(&task).begin(&run);
                        }
                    }
                }
            }));
        }

        info!(tasks = self.tasks.len(), run = run.id, "update orchestrator started");
        self.run = Some(run);
        Ok(())
    }

    /// Cancel every timer. Fetches already running finish on their own but
    /// their results are discarded. Once this returns no further result of
    /// this run is delivered.
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        *lock(&run.live) = false;
        run.cancel.cancel();
        for timer in self.timers.drain(..) {
            timer.abort();
        }
        info!("update orchestrator stopped");
    }

    /// Fetch one task now, outside its schedule. The task's timer is not
    /// reset.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::UnknownTask`] for an unregistered name and
    /// [`ThymeError::NotRunning`] when not started.
    pub fn trigger_now(&self, name: &str) -> Result<TriggerOutcome> {
        let task = self
            .tasks
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ThymeError::UnknownTask(name.to_owned()))?;
        let run = self.run.as_ref().ok_or(ThymeError::NotRunning)?;
        let outcome = if Arc::clone(task).begin(run) {
            TriggerOutcome::Started
        } else {
            TriggerOutcome::InFlight
        };
        debug!(task = name, ?outcome, "manual trigger");
        Ok(outcome)
    }

    /// [`Self::trigger_now`] for every task, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`ThymeError::NotRunning`] when not started.
    pub fn trigger_all(&self) -> Result<Vec<(String, TriggerOutcome)>> {
        self.tasks
            .iter()
            .map(|t| Ok((t.name().to_owned(), self.trigger_now(t.name())?)))
            .collect()
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.tasks.iter().map(|t| t.status()).collect()
    }

    /// Registered task names in registration order.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.name().to_owned()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }
}

impl Drop for UpdateOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::atomic::AtomicUsize;

    type Deliveries = Arc<Mutex<Vec<Refresh<u32>>>>;

    fn make_orchestrator() -> UpdateOrchestrator {
        UpdateOrchestrator::new(Duration::from_secs(60)).unwrap()
    }

    fn collector() -> (Deliveries, impl Fn(Refresh<u32>) + Send + Sync + 'static) {
        let seen: Deliveries = Arc::default();
        let sink = Arc::clone(&seen);
        (seen, move |r| sink.lock().unwrap().push(r))
    }

    /// Fetch that counts calls and returns the call number.
    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
    ) -> impl Fn() -> std::future::Ready<std::result::Result<u32, FetchError>> + Send + Sync + 'static
    {
        let calls = Arc::clone(calls);
        move || std::future::ready(Ok(calls.fetch_add(1, Ordering::SeqCst) as u32))
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[test]
    fn zero_timeout_is_config_error() {
        assert!(matches!(
            UpdateOrchestrator::new(Duration::ZERO),
            Err(ThymeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_task_name_is_config_error() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        orch.register_task("weather", Duration::from_secs(5), counting_fetch(&calls), |_| {})
            .unwrap();
        let err = orch
            .register_task("weather", Duration::from_secs(9), counting_fetch(&calls), |_| {})
            .unwrap_err();
        assert!(matches!(err, ThymeError::Config(ref m) if m.contains("already registered")));
        assert_eq!(orch.task_names(), vec!["weather"]);
    }

    #[tokio::test]
    async fn zero_interval_and_empty_name_rejected() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        assert!(matches!(
            orch.register_task("clock", Duration::ZERO, counting_fetch(&calls), |_| {}),
            Err(ThymeError::Config(_))
        ));
        assert!(matches!(
            orch.register_task(" ", Duration::from_secs(1), counting_fetch(&calls), |_| {}),
            Err(ThymeError::Config(_))
        ));
    }

    #[test]
    fn huge_interval_saturates_in_status() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        orch.register_task("clock", Duration::from_secs(u64::MAX), counting_fetch(&calls), |_| {})
            .unwrap();
        assert_eq!(orch.statuses()[0].interval_ms, u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn register_while_running_rejected() {
        let mut orch = make_orchestrator();
        orch.start().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        assert!(matches!(
            orch.register_task("late", Duration::from_secs(1), counting_fetch(&calls), |_| {}),
            Err(ThymeError::Config(_))
        ));
        assert!(matches!(orch.start(), Err(ThymeError::AlreadyRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_is_immediate() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let (seen, on_result) = collector();
        orch.register_task("weather", Duration::from_millis(3_600_000), counting_fetch(&calls), on_result)
            .unwrap();

        orch.start().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        advance(1).await;
        assert_eq!(seen.lock().unwrap().len(), 1);

        advance(3_590).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        advance(10).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_does_not_block_other_tasks() {
        let mut orch = UpdateOrchestrator::new(Duration::from_secs(3600)).unwrap();
        let weather_calls = Arc::new(AtomicUsize::new(0));
        let wc = Arc::clone(&weather_calls);
        orch.register_task(
            "weather",
            Duration::from_secs(10),
            move || {
                wc.fetch_add(1, Ordering::SeqCst);
                std::future::pending::<std::result::Result<u32, FetchError>>()
            },
            |_| {},
        )
        .unwrap();

        let calendar_calls = Arc::new(AtomicUsize::new(0));
        let (calendar_seen, on_calendar) = collector();
        orch.register_task("calendar", Duration::from_secs(10), counting_fetch(&calendar_calls), on_calendar)
            .unwrap();

        orch.start().unwrap();
        advance(35).await;

        // t = 0, 10, 20, 30
        assert_eq!(calendar_seen.lock().unwrap().len(), 4);
        assert_eq!(weather_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_overlapping_fetches_per_task() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let (c, a, m) = (Arc::clone(&calls), Arc::clone(&active), Arc::clone(&max_active));
        orch.register_task(
            "chat",
            Duration::from_secs(10),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                let (a, m) = (Arc::clone(&a), Arc::clone(&m));
                async move {
                    let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                    m.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(25)).await;
                    a.fetch_sub(1, Ordering::SeqCst);
                    Ok(1u32)
                }
            },
            |_| {},
        )
        .unwrap();

        orch.start().unwrap();
        advance(95).await;

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        // Started at 0, 30, 60, 90; the ticks in between were skipped.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_delivered_as_failure() {
        let mut orch = UpdateOrchestrator::new(Duration::from_secs(5)).unwrap();
        let (seen, on_result) = collector();
        orch.register_task(
            "weather",
            Duration::from_secs(600),
            || std::future::pending::<std::result::Result<u32, FetchError>>(),
            on_result,
        )
        .unwrap();

        orch.start().unwrap();
        advance(6).await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            &seen[0],
            Refresh::Unavailable { error: FetchError::Timeout(_) }
        ));
        assert_eq!(orch.trigger_now("weather").unwrap(), TriggerOutcome::Started);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_success_is_stale() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let (seen, on_result) = collector();
        orch.register_task(
            "weather",
            Duration::from_secs(10),
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(72)
                    } else {
                        Err(FetchError::Network("offline".into()))
                    }
                }
            },
            on_result,
        )
        .unwrap();

        orch.start().unwrap();
        advance(35).await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], Refresh::Fresh { value: 72 });
        match &seen[1] {
            Refresh::Stale { value, overdue, error, .. } => {
                assert_eq!(*value, 72);
                assert!(!overdue);
                assert_eq!(error.kind(), "network");
            }
            other => panic!("expected stale, got {other:?}"),
        }
        assert!(matches!(seen[3], Refresh::Stale { value: 72, overdue: true, .. }));

        let status = &orch.statuses()[0];
        assert_eq!(status.consecutive_failures, 3);
        assert!(status.last_success_at.is_some());
        assert!(status.overdue);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_history_is_unavailable() {
        let mut orch = make_orchestrator();
        let (seen, on_result) = collector();
        orch.register_task(
            "calendar",
            Duration::from_secs(10),
            || async { Err::<u32, _>(FetchError::Unauthorized("token expired".into())) },
            on_result,
        )
        .unwrap();

        orch.start().unwrap();
        advance(1).await;

        let seen = seen.lock().unwrap().clone();
        assert!(matches!(
            &seen[0],
            Refresh::Unavailable { error: FetchError::Unauthorized(_) }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_fetch_is_contained() {
        let mut orch = make_orchestrator();
        let (seen, on_result) = collector();
        orch.register_task(
            "background",
            Duration::from_secs(10),
            || async {
                let broken = true;
                if broken {
                    panic!("provider bug");
                }
                Ok::<u32, FetchError>(0)
            },
            on_result,
        )
        .unwrap();

        orch.start().unwrap();
        advance(15).await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert!(matches!(
            &seen[0],
            Refresh::Unavailable { error: FetchError::Unavailable(_) }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_panicking_before_it_starts_is_contained() {
        let mut orch = make_orchestrator();
        let (weather_seen, on_weather) = collector();
        orch.register_task(
            "weather",
            Duration::from_secs(10),
            || -> std::future::Ready<std::result::Result<u32, FetchError>> {
                panic!("missing api key")
            },
            on_weather,
        )
        .unwrap();
        let calendar_calls = Arc::new(AtomicUsize::new(0));
        let (calendar_seen, on_calendar) = collector();
        orch.register_task("calendar", Duration::from_secs(10), counting_fetch(&calendar_calls), on_calendar)
            .unwrap();

        orch.start().unwrap();
        advance(35).await;

        // t = 0, 10, 20, 30 for both tasks.
        assert_eq!(calendar_seen.lock().unwrap().len(), 4);
        let weather = weather_seen.lock().unwrap().clone();
        assert_eq!(weather.len(), 4);
        assert!(weather.iter().all(|r| matches!(
            r,
            Refresh::Unavailable { error: FetchError::Unavailable(_) }
        )));
        assert!(!orch.statuses()[0].in_flight);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_callback_releases_the_task() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        orch.register_task(
            "chat",
            Duration::from_secs(10),
            counting_fetch(&calls),
            |_: Refresh<u32>| panic!("renderer bug"),
        )
        .unwrap();

        orch.start().unwrap();
        advance(25).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!orch.statuses()[0].in_flight);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_fetches_immediately_while_old_fetch_runs() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let (seen, on_result) = collector();
        orch.register_task(
            "weather",
            Duration::from_secs(3600),
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst) as u32;
                async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(n)
                }
            },
            on_result,
        )
        .unwrap();

        orch.start().unwrap();
        advance(1).await;
        orch.stop();
        orch.start().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(orch.statuses()[0].in_flight);

        advance(10).await;
        // The first run's result is dropped; the second run's is delivered.
        assert_eq!(*seen.lock().unwrap(), vec![Refresh::Fresh { value: 1 }]);
        assert!(!orch.statuses()[0].in_flight);
        assert_eq!(orch.trigger_now("weather").unwrap(), TriggerOutcome::Started);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_waits_for_delivery_in_progress() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let marks: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        let m = Arc::clone(&marks);
        orch.register_task(
            "calendar",
            Duration::from_secs(3600),
            counting_fetch(&calls),
            move |_| {
                m.lock().unwrap().push("begin");
                std::thread::sleep(Duration::from_millis(100));
                m.lock().unwrap().push("end");
            },
        )
        .unwrap();

        orch.start().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        orch.stop();

        // Either the delivery finished before stop returned or it never ran.
        let at_stop = marks.lock().unwrap().clone();
        assert!(at_stop.is_empty() || at_stop == vec!["begin", "end"], "{at_stop:?}");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*marks.lock().unwrap(), at_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_errors() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        orch.register_task("chat", Duration::from_secs(10), counting_fetch(&calls), |_| {})
            .unwrap();

        assert!(matches!(orch.trigger_now("chat"), Err(ThymeError::NotRunning)));
        orch.start().unwrap();
        assert!(matches!(
            orch.trigger_now("nope"),
            Err(ThymeError::UnknownTask(ref n)) if n == "nope"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_does_not_reset_timer() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        orch.register_task("calendar", Duration::from_secs(60), counting_fetch(&calls), |_| {})
            .unwrap();

        orch.start().unwrap();
        advance(15).await;
        assert_eq!(orch.trigger_now("calendar").unwrap(), TriggerOutcome::Started);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Regular tick still due at t = 60, not t = 75.
        advance(44).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        advance(2).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_while_in_flight_is_coalesced() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        orch.register_task(
            "weather",
            Duration::from_secs(600),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(1u32)
                }
            },
            |_| {},
        )
        .unwrap();

        orch.start().unwrap();
        assert_eq!(orch.trigger_now("weather").unwrap(), TriggerOutcome::InFlight);
        assert!(orch.statuses()[0].in_flight);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        advance(6).await;
        assert!(!orch.statuses()[0].in_flight);
        let outcomes = orch.trigger_all().unwrap();
        assert_eq!(outcomes, vec![("weather".to_owned(), TriggerOutcome::Started)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drops_in_flight_results() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let (seen, on_result) = collector();
        orch.register_task(
            "calendar",
            Duration::from_secs(10),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(9u32)
                }
            },
            on_result,
        )
        .unwrap();

        orch.start().unwrap();
        advance(1).await;
        orch.stop();
        assert!(!orch.is_running());

        advance(100).await;
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(orch.trigger_now("calendar"), Err(ThymeError::NotRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn results_per_task_arrive_in_order() {
        let mut orch = make_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let (seen, on_result) = collector();
        orch.register_task("clock", Duration::from_secs(1), counting_fetch(&calls), on_result)
            .unwrap();

        orch.start().unwrap();
        advance(10).await;
        orch.stop();

        let values: Vec<u32> = seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.value().copied())
            .collect();
        assert!(values.len() >= 10);
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }
}
