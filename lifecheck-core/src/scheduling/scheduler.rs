use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Datelike;
use lifecheck_model::{RunOutcome, RunPhase, ScheduleWindow};
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::window::{date_key, nominal_start_date, schedule_key, within_window};
use crate::database::ports::{
    run_state::RunStateRepository, schedule::ScheduleRepository,
};
use crate::orchestration::{ProcessRunner, RunTrigger, WindowPredicate};

/// Timer settings for the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Pause between two ticks.
    pub tick_interval: Duration,
    /// Delay before the first tick.
    pub initial_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// What a single tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still in flight; this one was dropped.
    Overlapping,
    NoEligibleWindow,
    /// A window was eligible but a run already holds the lease.
    AlreadyRunning,
    Triggered(RunOutcome),
    /// Reading windows or state failed; nothing was started.
    Failed,
}

struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn try_enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Evaluates configured windows on a fixed tick and starts batch runs.
pub struct TriggerScheduler {
    schedule: Arc<dyn ScheduleRepository>,
    run_state: Arc<dyn RunStateRepository>,
    runner: Arc<dyn ProcessRunner>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    tick_running: AtomicBool,
    last_run_by_key: Mutex<HashMap<String, String>>,
}

impl fmt::Debug for TriggerScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerScheduler")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .field("tick_running", &self.tick_running.load(Ordering::Relaxed))
            .field("dedupe_keys", &self.last_run_by_key.lock().len())
            .finish_non_exhaustive()
    }
}

impl TriggerScheduler {
    /// Scheduler over the stored windows. `clock` supplies local time.
    pub fn new(
        schedule: Arc<dyn ScheduleRepository>,
        run_state: Arc<dyn RunStateRepository>,
        runner: Arc<dyn ProcessRunner>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            schedule,
            run_state,
            runner,
            clock,
            config,
            tick_running: AtomicBool::new(false),
            last_run_by_key: Mutex::new(HashMap::new()),
        }
    }

    /// Runs one evaluation. At most one run is triggered, and the call
    /// returns once that run finishes.
    pub async fn tick(&self) -> TickOutcome {
        let Some(_guard) = TickGuard::try_enter(&self.tick_running) else {
            debug!(target: "lifecheck::cron", "previous tick still running");
            return TickOutcome::Overlapping;
        };

        let mut windows = match self.schedule.list_windows().await {
            Ok(windows) => windows,
            Err(err) => {
                error!(target: "lifecheck::cron", error = %err, "scheduler error");
                return TickOutcome::Failed;
            }
        };
        if windows.is_empty() {
            return TickOutcome::NoEligibleWindow;
        }

        let phase = match self.run_state.load_state().await {
            Ok(state) => state.map(|s| s.phase).unwrap_or(RunPhase::Idle),
            Err(err) => {
                error!(target: "lifecheck::cron", error = %err, "scheduler error");
                return TickOutcome::Failed;
            }
        };
        let is_done = phase.is_terminal();
        let now = self.clock.now();
        windows.sort_by_key(ScheduleWindow::sort_key);

        for window in windows {
            let Some(start_date) = nominal_start_date(&window, now.year()) else {
                continue;
            };
            if now.date() < start_date || !within_window(&window, start_date, now) {
                continue;
            }

            let is_start_day = now.date() == start_date;
            if is_done && !is_start_day {
                continue;
            }

            let key = schedule_key(&window);
            let today = date_key(now.date());
            if is_done && self.last_run_by_key.lock().get(&key) == Some(&today) {
                continue;
            }

            if self.runner.is_running() {
                warn!(target: "lifecheck::cron", "process already running, skipping tick");
                return TickOutcome::AlreadyRunning;
            }

            self.last_run_by_key.lock().insert(key.clone(), today);
            info!(target: "lifecheck::cron", window = %window, "triggering process");

            let clock = Arc::clone(&self.clock);
            let still_open: WindowPredicate =
                Arc::new(move || within_window(&window, start_date, clock.now()));
            let outcome = self
                .runner
                .run_process(RunTrigger::Scheduled {
                    window_key: key,
                    still_open,
                })
                .await;

            if !outcome.is_ok() {
                error!(target: "lifecheck::cron", state = outcome.message(), "process error");
            }
            return TickOutcome::Triggered(outcome);
        }

        TickOutcome::NoEligibleWindow
    }

    /// Drives ticks until `shutdown` fires, then waits for the in-flight
    /// tick to wind down.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            target: "lifecheck::cron",
            tick_secs = self.config.tick_interval.as_secs(),
            "scheduler started"
        );

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(target: "lifecheck::cron", "scheduler stopped before first tick");
                return;
            }
            _ = tokio::time::sleep(self.config.initial_delay) => {}
        }

        let mut ticks = tokio::time::interval(self.config.tick_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticks.tick() => {
                    while in_flight.try_join_next().is_some() {}
                    let scheduler = Arc::clone(&self);
                    in_flight.spawn(async move {
                        let outcome = scheduler.tick().await;
                        debug!(target: "lifecheck::cron", ?outcome, "tick finished");
                    });
                }
            }
        }

        while in_flight.join_next().await.is_some() {}
        info!(target: "lifecheck::cron", "scheduler stopped");
    }
}
