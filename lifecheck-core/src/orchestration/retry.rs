//! Retry engine shared by both verification phases.
//!
//! Three layers, innermost first:
//! - [`retry_with_backoff`] retries one external call with a fixed delay;
//! - [`process_rows`] runs one round over a batch of rows, turning each
//!   row's final result into a durable update;
//! - [`verify_until_done`] repeats rounds until nothing is pending.
//!
//! Cancellation is cooperative everywhere and always reported apart from
//! failure.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::cancel::RunCancellation;
use super::config::RetryConfig;
use crate::error::{CoreError, Result};
use crate::providers::ProviderError;

/// Errors an attempt can end with.
pub trait AttemptError: fmt::Display {
    /// The attempt observed cancellation and must not be retried.
    fn is_cancellation(&self) -> bool {
        false
    }
}

impl AttemptError for CoreError {
    fn is_cancellation(&self) -> bool {
        matches!(self, CoreError::Cancelled(_))
    }
}

impl AttemptError for ProviderError {}

/// How a retried call ended.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// A call succeeded on attempt `attempts`.
    Succeeded { value: T, attempts: u16 },
    /// Every allowed attempt failed; `error` is the last one.
    Exhausted { error: E, attempts: u16 },
    /// Cancellation was observed before or during an attempt.
    Cancelled { attempts: u16 },
}

/// Calls `op` until it succeeds, `policy.max_attempts` calls were made, or
/// cancellation is observed.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryConfig,
    cancel: &RunCancellation,
    mut op: F,
) -> RetryOutcome<T, E>
where
    E: AttemptError,
    F: FnMut(u16) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u16;

    loop {
        if cancel.check().is_err() {
            return RetryOutcome::Cancelled { attempts };
        }

        attempts += 1;
        match op(attempts).await {
            Ok(value) => return RetryOutcome::Succeeded { value, attempts },
            Err(error) if error.is_cancellation() => {
                return RetryOutcome::Cancelled { attempts };
            }
            Err(error) if attempts >= max_attempts => {
                warn!(
                    target: "lifecheck::retry",
                    attempts,
                    error = %error,
                    "attempts exhausted"
                );
                return RetryOutcome::Exhausted { error, attempts };
            }
            Err(error) => {
                warn!(
                    target: "lifecheck::retry",
                    attempt = attempts,
                    max_attempts,
                    delay_ms = policy.delay_ms,
                    error = %error,
                    "attempt failed; retrying"
                );
                if cancel.sleep(policy.delay()).await.is_err() {
                    return RetryOutcome::Cancelled { attempts };
                }
            }
        }
    }
}

/// Counts kept while a round walks its rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    /// Rows resolved and persisted.
    pub succeeded: usize,
    /// Rows marked failed after their attempts ran out.
    pub failed: usize,
}

/// Result of one pass over a batch of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Every row was attempted.
    Completed(RoundSummary),
    /// Cancellation stopped the round early.
    Stopped(RoundSummary),
}

/// One external check applied row by row.
#[async_trait]
pub trait RowCheck: Send + Sync {
    type Row: Send + Sync;
    type Value: Send;

    /// One attempt against the external service.
    async fn call(&self, row: &Self::Row, attempt: u16) -> Result<Self::Value>;

    /// Persists a successful answer.
    async fn on_success(&self, row: &Self::Row, value: Self::Value) -> Result<()>;

    /// Persists the failure marker once attempts are exhausted.
    async fn on_failure(&self, row: &Self::Row, error: &CoreError) -> Result<()>;
}

/// Runs one round over `rows`.
///
/// A row failing never aborts the round. Cancellation stops before the next
/// row; updates already written stay. Errors from the persistence callbacks
/// abort the round.
pub async fn process_rows<C: RowCheck>(
    check: &C,
    rows: &[C::Row],
    policy: &RetryConfig,
    cancel: &RunCancellation,
) -> Result<RoundOutcome> {
    let mut summary = RoundSummary::default();

    for row in rows {
        if cancel.check().is_err() {
            return Ok(RoundOutcome::Stopped(summary));
        }

        match retry_with_backoff(policy, cancel, move |attempt| {
            check.call(row, attempt)
        })
        .await
        {
            RetryOutcome::Succeeded { value, .. } => {
                check.on_success(row, value).await?;
                summary.succeeded += 1;
            }
            RetryOutcome::Exhausted { error, .. } => {
                check.on_failure(row, &error).await?;
                summary.failed += 1;
            }
            RetryOutcome::Cancelled { .. } => {
                return Ok(RoundOutcome::Stopped(summary));
            }
        }
    }

    Ok(RoundOutcome::Completed(summary))
}

/// Result of the verify-until-done loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceOutcome {
    /// Nothing left pending; `rounds` passes were run.
    Converged { rounds: u16 },
    /// The round limit was reached with `remaining` rows still pending.
    Exhausted { remaining: i64 },
    /// Cancellation ended the loop.
    Stopped,
}

/// Repeats `round` until `count` reports nothing pending, at most
/// `max_rounds` times, sleeping `round_delay` between rounds.
pub async fn verify_until_done<C, CF, R, RF>(
    max_rounds: u16,
    round_delay: Duration,
    cancel: &RunCancellation,
    mut count: C,
    mut round: R,
) -> Result<ConvergenceOutcome>
where
    C: FnMut() -> CF,
    CF: Future<Output = Result<i64>>,
    R: FnMut(u16) -> RF,
    RF: Future<Output = Result<RoundOutcome>>,
{
    for index in 0..max_rounds {
        if cancel.check().is_err() {
            return Ok(ConvergenceOutcome::Stopped);
        }

        let remaining = count().await?;
        if remaining <= 0 {
            return Ok(ConvergenceOutcome::Converged { rounds: index });
        }

        if index > 0 && cancel.sleep(round_delay).await.is_err() {
            return Ok(ConvergenceOutcome::Stopped);
        }

        debug!(
            target: "lifecheck::retry",
            round = index + 1,
            max_rounds,
            remaining,
            "starting verification round"
        );

        match round(index + 1).await? {
            RoundOutcome::Completed(summary) => {
                debug!(
                    target: "lifecheck::retry",
                    round = index + 1,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "verification round finished"
                );
            }
            RoundOutcome::Stopped(_) => return Ok(ConvergenceOutcome::Stopped),
        }
    }

    let remaining = count().await?;
    if remaining <= 0 {
        Ok(ConvergenceOutcome::Converged { rounds: max_rounds })
    } else {
        Ok(ConvergenceOutcome::Exhausted { remaining })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::orchestration::cancel::WindowPredicate;

    fn fast_policy() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            delay_ms: 1,
        }
    }

    fn open_cancel() -> RunCancellation {
        RunCancellation::new(CancellationToken::new(), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_after_two_failures() {
        let calls = AtomicUsize::new(0);
        let outcome = retry_with_backoff(&fast_policy(), &open_cancel(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::ApiError("busy".into()))
                } else {
                    Ok("resolved")
                }
            }
        })
        .await;

        assert!(matches!(
            outcome,
            RetryOutcome::Succeeded { value: "resolved", attempts: 3 }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let outcome: RetryOutcome<(), _> =
            retry_with_backoff(&fast_policy(), &open_cancel(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::ApiError("down".into())) }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_signalled_by_attempt_stops_retrying() {
        let calls = AtomicUsize::new(0);
        let outcome: RetryOutcome<(), _> =
            retry_with_backoff(&fast_policy(), &open_cancel(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CoreError::Cancelled("window closed".into())) }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Cancelled { attempts: 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_during_delay_is_cancelled_not_exhausted() {
        let token = CancellationToken::new();
        let cancel = RunCancellation::new(token.clone(), Duration::from_millis(5));
        let policy = RetryConfig {
            max_attempts: 3,
            delay_ms: 60_000,
        };

        let outcome: RetryOutcome<(), _> =
            retry_with_backoff(&policy, &cancel, |_| {
                token.cancel();
                async { Err(ProviderError::ApiError("down".into())) }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Cancelled { attempts: 1 }));
    }

    #[tokio::test]
    async fn zero_pending_converges_without_rounds() {
        let rounds = AtomicUsize::new(0);
        let outcome = verify_until_done(
            5,
            Duration::ZERO,
            &open_cancel(),
            || async { Ok(0) },
            |_| {
                rounds.fetch_add(1, Ordering::SeqCst);
                async { Ok(RoundOutcome::Completed(RoundSummary::default())) }
            },
        )
        .await
        .expect("converge");

        assert_eq!(outcome, ConvergenceOutcome::Converged { rounds: 0 });
        assert_eq!(rounds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn final_count_decides_after_last_round() {
        let pending = Arc::new(Mutex::new(3i64));
        let outcome = verify_until_done(
            2,
            Duration::from_millis(1),
            &open_cancel(),
            || {
                let pending = Arc::clone(&pending);
                async move { Ok(*pending.lock().await) }
            },
            |_| {
                let pending = Arc::clone(&pending);
                async move {
                    let mut left = pending.lock().await;
                    *left = (*left - 2).max(0);
                    Ok(RoundOutcome::Completed(RoundSummary::default()))
                }
            },
        )
        .await
        .expect("converge");

        assert_eq!(outcome, ConvergenceOutcome::Converged { rounds: 2 });
    }

    #[tokio::test]
    async fn stubborn_rows_exhaust_rounds() {
        let outcome = verify_until_done(
            3,
            Duration::ZERO,
            &open_cancel(),
            || async { Ok(4) },
            |_| async { Ok(RoundOutcome::Completed(RoundSummary::default())) },
        )
        .await
        .expect("verify");

        assert_eq!(outcome, ConvergenceOutcome::Exhausted { remaining: 4 });
    }

    struct RecordingCheck {
        outcomes: Mutex<Vec<(u32, &'static str)>>,
        fail_rows: Vec<u32>,
    }

    #[async_trait]
    impl RowCheck for RecordingCheck {
        type Row = u32;
        type Value = u32;

        async fn call(&self, row: &u32, _attempt: u16) -> Result<u32> {
            if self.fail_rows.contains(row) {
                Err(CoreError::Provider(ProviderError::ApiError("no".into())))
            } else {
                Ok(*row * 10)
            }
        }

        async fn on_success(&self, row: &u32, _value: u32) -> Result<()> {
            self.outcomes.lock().await.push((*row, "ok"));
            Ok(())
        }

        async fn on_failure(&self, row: &u32, _error: &CoreError) -> Result<()> {
            self.outcomes.lock().await.push((*row, "failed"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_row_does_not_abort_round() {
        let check = RecordingCheck {
            outcomes: Mutex::new(Vec::new()),
            fail_rows: vec![2],
        };

        let outcome = process_rows(&check, &[1, 2, 3], &fast_policy(), &open_cancel())
            .await
            .expect("round");

        assert_eq!(
            outcome,
            RoundOutcome::Completed(RoundSummary {
                succeeded: 2,
                failed: 1
            })
        );
        assert_eq!(
            *check.outcomes.lock().await,
            vec![(1, "ok"), (2, "failed"), (3, "ok")]
        );
    }

    #[tokio::test]
    async fn window_closing_mid_round_keeps_finished_rows() {
        let check = RecordingCheck {
            outcomes: Mutex::new(Vec::new()),
            fail_rows: Vec::new(),
        };
        // Each row consumes two checks (round loop + first attempt).
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&checks);
        let predicate: WindowPredicate =
            Arc::new(move || counter.fetch_add(1, Ordering::SeqCst) < 4);
        let cancel = open_cancel().with_window(Some(predicate));

        let outcome = process_rows(&check, &[1, 2, 3, 4, 5], &fast_policy(), &cancel)
            .await
            .expect("round");

        assert_eq!(
            outcome,
            RoundOutcome::Stopped(RoundSummary {
                succeeded: 2,
                failed: 0
            })
        );
        assert_eq!(*check.outcomes.lock().await, vec![(1, "ok"), (2, "ok")]);
    }
}
