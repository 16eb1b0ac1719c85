//! Auto-refresh scheduler.
//!
//! Runs a registered refresh task on a fixed interval and on demand. At most
//! one refresh runs at a time: a tick or trigger arriving while a refresh is
//! in progress is dropped, not queued.
//!
//! ```text
//! Idle ──(tick | trigger)──> Refreshing ──(task settled + settle delay)──> Idle
//! ```
//!
//! The task can be replaced at any time with [`AutoRefresh::set_task`]; the
//! next run uses the replacement. [`AutoRefresh::stop`] (or dropping the
//! scheduler) cancels the timer and discards any tick that has fired but not
//! yet started its refresh. A refresh already running is left to finish.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Boxed future returned by a refresh task.
pub type RefreshFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

type RefreshTask = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;

/// Default pause between a refresh settling and the flag clearing.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(400);

/// Observable scheduler state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatus {
    pub is_refreshing: bool,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Error of the most recent run, cleared by the next success.
    pub last_error: Option<String>,
}

/// What happened to a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Completed,
    Failed,
    /// Another refresh was already running.
    Skipped,
}

/// Timing of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between ticks. Zero disables the timer.
    pub interval: Duration,
    pub settle_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::every_minutes(5)
    }
}

impl SchedulerConfig {
    #[must_use]
    pub const fn every_minutes(minutes: u64) -> Self {
        Self {
            interval: Duration::from_secs(minutes.saturating_mul(60)),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// No timer; refreshes only run when triggered.
    #[must_use]
    pub const fn manual_only() -> Self {
        Self {
            interval: Duration::ZERO,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

struct Shared {
    task: RwLock<RefreshTask>,
    refreshing: AtomicBool,
    stopped: AtomicBool,
    status: watch::Sender<RefreshStatus>,
    settle_delay: Duration,
}

impl Shared {
    fn current_task(&self) -> RefreshTask {
        Arc::clone(&self.task.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Clears the refreshing flag even if the refresh future is dropped early.
struct RefreshGuard<'a>(&'a Shared);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.status.send_modify(|s| s.is_refreshing = false);
        self.0.refreshing.store(false, Ordering::Release);
    }
}

async fn run_guarded(shared: &Shared) -> TriggerOutcome {
    if shared
        .refreshing
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!("Refresh already running, trigger dropped");
        return TriggerOutcome::Skipped;
    }
    let guard = RefreshGuard(shared);
    shared.status.send_modify(|s| s.is_refreshing = true);

    let task = shared.current_task();
    let result = task().await;
    tokio::time::sleep(shared.settle_delay).await;

    let outcome = match result {
        Ok(()) => {
            shared.status.send_modify(|s| {
                s.last_refreshed_at = Some(Utc::now());
                s.last_error = None;
            });
            TriggerOutcome::Completed
        }
        Err(e) => {
            warn!(error = %e, "Refresh failed");
            shared.status.send_modify(|s| s.last_error = Some(e.to_string()));
            TriggerOutcome::Failed
        }
    };
    drop(guard);
    outcome
}

/// Timer-driven run; `None` once the scheduler has been stopped.
async fn run_tick(shared: &Shared) -> Option<TriggerOutcome> {
    if shared.stopped.load(Ordering::Acquire) {
        debug!("Scheduler stopped, tick dropped");
        return None;
    }
    Some(run_guarded(shared).await)
}

fn boxed<F, Fut>(task: F) -> RefreshTask
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move || -> RefreshFuture { Box::pin(task()) })
}

/// Recurring, cancellable refresh runner.
pub struct AutoRefresh {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl AutoRefresh {
    /// Register `task` and start the timer.
    ///
    /// The first tick fires one interval after start.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime and the interval is non-zero.
    pub fn start<F, Fut>(task: F, config: SchedulerConfig) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (status, _) = watch::channel(RefreshStatus::default());
        let shared = Arc::new(Shared {
            task: RwLock::new(boxed(task)),
            refreshing: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            status,
            settle_delay: config.settle_delay,
        });

        let timer = (!config.interval.is_zero())
            .then(|| spawn_timer(Arc::clone(&shared), config.interval));
        if timer.is_some() {
            info!(interval_secs = config.interval.as_secs(), "Auto-refresh started");
        }

        Self {
            shared,
            timer: Mutex::new(timer),
        }
    }

    /// Replace the refresh task. The timer keeps running.
    pub fn set_task<F, Fut>(&self, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        *self
            .shared
            .task
            .write()
            .unwrap_or_else(PoisonError::into_inner) = boxed(task);
    }

    /// Run a refresh now unless one is already running.
    pub async fn trigger(&self) -> TriggerOutcome {
        run_guarded(&self.shared).await
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.shared.refreshing.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn status(&self) -> RefreshStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<RefreshStatus> {
        self.shared.status.subscribe()
    }

    /// The timer is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Cancel the timer. No timer-driven refresh starts after this returns;
    /// [`AutoRefresh::trigger`] still works.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        if let Some(handle) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            debug!("Auto-refresh stopped");
        }
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_timer(shared: Arc<Shared>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(first_tick) = Instant::now().checked_add(interval) else {
            warn!(interval_secs = interval.as_secs(), "Refresh interval out of range, timer disabled");
            return;
        };
        let mut ticker = tokio::time::interval_at(first_tick, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let shared = Arc::clone(&shared);
            // detached so stopping the timer never cuts a refresh short
            tokio::spawn(async move {
                run_tick(&shared).await;
            });
        }
    })
}
