use std::{fmt, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

/// Live "may the run keep going" check, typically bound to a schedule window.
pub type WindowPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Marker returned when cooperative cancellation was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped;

impl fmt::Display for Stopped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("stopped by cancellation")
    }
}

/// Cancellation seen by a single run: process shutdown plus an optional
/// window predicate evaluated on every check.
#[derive(Clone)]
pub struct RunCancellation {
    shutdown: CancellationToken,
    window: Option<WindowPredicate>,
    poll: Duration,
}

impl fmt::Debug for RunCancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCancellation")
            .field("shutdown_cancelled", &self.shutdown.is_cancelled())
            .field("has_window", &self.window.is_some())
            .field("poll", &self.poll)
            .finish()
    }
}

impl RunCancellation {
    /// `poll` bounds how long a sleep goes without re-checking the window.
    pub fn new(shutdown: CancellationToken, poll: Duration) -> Self {
        Self {
            shutdown,
            window: None,
            poll: poll.max(Duration::from_millis(1)),
        }
    }

    /// Binds the run to a schedule window; `None` means shutdown only.
    pub fn with_window(mut self, predicate: Option<WindowPredicate>) -> Self {
        self.window = predicate;
        self
    }

    /// Neither shutdown nor a closed window has been observed.
    pub fn should_continue(&self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        self.window.as_ref().is_none_or(|still_open| still_open())
    }

    /// [`Self::should_continue`] as a `Result` for `?`.
    pub fn check(&self) -> Result<(), Stopped> {
        if self.should_continue() {
            Ok(())
        } else {
            Err(Stopped)
        }
    }

    /// Sleeps for `duration`, re-checking cancellation at least once per
    /// poll interval and waking immediately on shutdown.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Stopped> {
        let mut remaining = duration;
        loop {
            self.check()?;
            if remaining.is_zero() {
                return Ok(());
            }
            let step = remaining.min(self.poll);
            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(Stopped),
                _ = tokio::time::sleep(step) => {}
            }
            remaining = remaining.saturating_sub(step);
        }
    }
}
