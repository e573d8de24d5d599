use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use lifecheck_model::{
    CheckKind, LogDetailId, LogRun, LogRunId, NewSubject, RunOutcome, RunPhase,
    RunStatusReport,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    cancel::{RunCancellation, WindowPredicate},
    config::OrchestratorConfig,
    lease::{LeaseId, RunLease},
    retry::{
        ConvergenceOutcome, RowCheck, process_rows, verify_until_done,
    },
    verification::{CivilRegistryCheck, PopulationCheck},
};
use crate::{
    database::DatabaseContext,
    error::{CoreError, Result},
    providers::{CivilRegistry, PopulationRegistry},
};

/// Who asked for a run, and what may stop it.
#[derive(Clone)]
pub enum RunTrigger {
    /// Operator request; only process shutdown stops it.
    Manual,
    /// Scheduler request bound to a window that is re-evaluated live.
    Scheduled {
        window_key: String,
        still_open: WindowPredicate,
    },
}

impl RunTrigger {
    fn owner(&self) -> String {
        match self {
            RunTrigger::Manual => "manual".to_string(),
            RunTrigger::Scheduled { window_key, .. } => {
                format!("schedule:{window_key}")
            }
        }
    }

    fn window(&self) -> Option<WindowPredicate> {
        match self {
            RunTrigger::Manual => None,
            RunTrigger::Scheduled { still_open, .. } => {
                Some(Arc::clone(still_open))
            }
        }
    }
}

impl fmt::Debug for RunTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunTrigger::Manual => f.write_str("Manual"),
            RunTrigger::Scheduled { window_key, .. } => f
                .debug_struct("Scheduled")
                .field("window_key", window_key)
                .finish_non_exhaustive(),
        }
    }
}

/// Immutable per-run values handed to every phase.
#[derive(Debug)]
pub struct RunContext {
    /// Log run of the current attempt.
    pub log_id: LogRunId,
    /// Shared lease this run holds.
    pub lease_id: LeaseId,
    /// Shutdown and window checks for the run.
    pub cancel: RunCancellation,
}

/// Entry point used by the scheduler to start runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Whether this process is currently driving a run.
    fn is_running(&self) -> bool;

    /// Runs the batch to completion or until stopped. Never overlaps with
    /// another run, in this process or any other sharing the store.
    async fn run_process(&self, trigger: RunTrigger) -> RunOutcome;
}

enum Step {
    Continue(RunPhase),
    Stopped,
}

#[derive(Debug, Clone, Copy)]
enum PhaseStep {
    PullCensus,
    CheckPopulation,
    AwaitLogin,
    CheckCivilRegistry,
    Finish,
}

impl PhaseStep {
    const ORDER: [PhaseStep; 5] = [
        PhaseStep::PullCensus,
        PhaseStep::CheckPopulation,
        PhaseStep::AwaitLogin,
        PhaseStep::CheckCivilRegistry,
        PhaseStep::Finish,
    ];

    /// Phase recorded against the log run when this step fails.
    fn working_phase(self) -> RunPhase {
        match self {
            PhaseStep::PullCensus => RunPhase::PullingCensus,
            PhaseStep::CheckPopulation => RunPhase::CheckingPopulation,
            PhaseStep::AwaitLogin => RunPhase::AwaitingLogin,
            PhaseStep::CheckCivilRegistry => RunPhase::CheckingCivilRegistry,
            PhaseStep::Finish => RunPhase::Completed,
        }
    }
}

/// Drives one batch through its phases, resuming from the persisted phase.
pub struct BatchOrchestrator {
    db: DatabaseContext,
    population: Arc<dyn PopulationRegistry>,
    civil: Arc<dyn CivilRegistry>,
    config: OrchestratorConfig,
    lease: RunLease,
    shutdown: CancellationToken,
}

impl fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("db", &self.db)
            .field("config", &self.config)
            .field("lease_held", &self.lease.is_held())
            .field("shutdown_cancelled", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BatchOrchestrator {
    /// `shutdown` cancels any run in flight; runs inherit a child token.
    pub fn new(
        db: DatabaseContext,
        population: Arc<dyn PopulationRegistry>,
        civil: Arc<dyn CivilRegistry>,
        config: OrchestratorConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            db,
            population,
            civil,
            config,
            lease: RunLease::new(),
            shutdown,
        }
    }

    /// Snapshot of the persisted phase and the current attempt's log.
    /// A run held by another process counts as processing.
    pub async fn status(&self) -> Result<RunStatusReport> {
        let state = self.db.run_state().load_state().await?;
        let log_id = state.and_then(|s| s.log_id);
        let details = match log_id {
            Some(id) => self.db.run_state().log_details(id).await?,
            None => Vec::new(),
        };
        let is_processing = self.lease.is_held()
            || self.db.run_lease().current().await?.is_some();

        Ok(RunStatusReport {
            is_processing,
            phase: state.map(|s| s.phase),
            log_id,
            details,
        })
    }

    /// Most recent log runs first; `limit` is at least one.
    pub async fn history(&self, limit: i64) -> Result<Vec<LogRun>> {
        self.db.run_state().list_runs(limit.max(1)).await
    }

    async fn execute(&self, trigger: RunTrigger) -> RunOutcome {
        let Some(guard) = self.lease.try_acquire(trigger.owner()) else {
            info!(target: "lifecheck::sys", "processing already running");
            return RunOutcome::AlreadyRunning;
        };

        let cancel = RunCancellation::new(
            self.shutdown.child_token(),
            self.config.cancellation_poll(),
        )
        .with_window(trigger.window());

        if !cancel.should_continue() {
            info!(target: "lifecheck::sys", "stopped by schedule window");
            return RunOutcome::StoppedByWindow;
        }

        match self
            .db
            .run_lease()
            .try_acquire(guard.lease_id, &guard.lease_owner, self.config.lease_ttl())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    target: "lifecheck::sys",
                    owner = %guard.lease_owner,
                    "processing already running in another process"
                );
                return RunOutcome::AlreadyRunning;
            }
            Err(err) => {
                error!(target: "lifecheck::sys", error = %err, "failed to acquire run lease");
                return RunOutcome::ProcessingError;
            }
        }

        info!(
            target: "lifecheck::sys",
            lease_id = %guard.lease_id.0,
            owner = %guard.lease_owner,
            "processing started"
        );

        let result = tokio::select! {
            result = self.drive(cancel, guard.lease_id) => result,
            lost = self.hold_lease(guard.lease_id) => Err(lost),
        };

        if let Err(err) = self.db.run_lease().release(guard.lease_id).await {
            warn!(
                target: "lifecheck::sys",
                lease_id = %guard.lease_id.0,
                error = %err,
                "failed to release run lease"
            );
        }
        let elapsed_ms = (Utc::now() - guard.acquired_at).num_milliseconds();

        match result {
            Ok(outcome) => {
                info!(
                    target: "lifecheck::sys",
                    outcome = outcome.message(),
                    elapsed_ms,
                    "processing finished"
                );
                outcome
            }
            Err(err) => {
                error!(target: "lifecheck::sys", error = %err, elapsed_ms, "processing error");
                RunOutcome::ProcessingError
            }
        }
    }

    /// Renews the shared lease until it is lost. Transient store errors are
    /// retried on the next beat; the TTL covers the gap.
    async fn hold_lease(&self, lease_id: LeaseId) -> CoreError {
        let ttl = self.config.lease_ttl();
        let beat = self.config.lease_heartbeat();
        loop {
            tokio::time::sleep(beat).await;
            match self.db.run_lease().renew(lease_id, ttl).await {
                Ok(true) => {
                    debug!(target: "lifecheck::sys", lease_id = %lease_id.0, "run lease renewed");
                }
                Ok(false) => {
                    return CoreError::LeaseLost(format!(
                        "lease {} was taken over or expired",
                        lease_id.0
                    ));
                }
                Err(err) => {
                    warn!(
                        target: "lifecheck::sys",
                        lease_id = %lease_id.0,
                        error = %err,
                        "run lease renewal failed"
                    );
                }
            }
        }
    }

    async fn drive(
        &self,
        cancel: RunCancellation,
        lease_id: LeaseId,
    ) -> Result<RunOutcome> {
        let Some(state) = self.db.run_state().load_state().await? else {
            warn!(target: "lifecheck::sys", "no run state found");
            return Ok(RunOutcome::NoStateFound);
        };

        let log_id = match state.log_id {
            Some(id) if !state.phase.starts_new_attempt() => id,
            _ => self.db.run_state().create_log_run().await?,
        };

        let ctx = RunContext {
            log_id,
            lease_id,
            cancel,
        };

        info!(
            target: "lifecheck::sys",
            log_id = %ctx.log_id,
            lease_id = %ctx.lease_id.0,
            phase = %state.phase,
            "resuming from persisted phase"
        );

        let mut phase = state.phase;
        for step in PhaseStep::ORDER {
            if !ctx.cancel.should_continue() {
                info!(target: "lifecheck::sys", phase = %phase, "stopped by schedule window");
                return Ok(RunOutcome::StoppedByWindow);
            }

            match self.run_step(step, &ctx, phase).await {
                Ok(Step::Continue(next)) => phase = next,
                Ok(Step::Stopped) => {
                    info!(target: "lifecheck::sys", phase = %phase, "stopped by schedule window");
                    return Ok(RunOutcome::StoppedByWindow);
                }
                Err(CoreError::Cancelled(reason)) => {
                    info!(target: "lifecheck::sys", phase = %phase, reason = %reason, "stopped by schedule window");
                    return Ok(RunOutcome::StoppedByWindow);
                }
                Err(err) => {
                    self.mark_error(&ctx, step.working_phase(), &err).await;
                    return Ok(RunOutcome::ProcessingError);
                }
            }
        }

        Ok(RunOutcome::Done)
    }

    async fn run_step(
        &self,
        step: PhaseStep,
        ctx: &RunContext,
        phase: RunPhase,
    ) -> Result<Step> {
        match step {
            PhaseStep::PullCensus => self.pull_census(ctx, phase).await,
            PhaseStep::CheckPopulation => self.check_population(ctx, phase).await,
            PhaseStep::AwaitLogin => self.await_login(ctx, phase).await,
            PhaseStep::CheckCivilRegistry => {
                self.check_civil_registry(ctx, phase).await
            }
            PhaseStep::Finish => self.finish(ctx, phase).await,
        }
    }

    async fn transition(
        &self,
        ctx: &RunContext,
        phase: RunPhase,
        row_count: Option<i64>,
    ) -> Result<LogDetailId> {
        let detail_id = self
            .db
            .run_state()
            .record_transition(ctx.log_id, phase, row_count)
            .await?;
        debug!(
            target: "lifecheck::sys",
            log_id = %ctx.log_id,
            detail_id = %detail_id,
            phase = %phase,
            "phase persisted"
        );
        Ok(detail_id)
    }

    async fn mark_error(&self, ctx: &RunContext, phase: RunPhase, err: &CoreError) {
        error!(
            target: "lifecheck::sys",
            log_id = %ctx.log_id,
            lease_id = %ctx.lease_id.0,
            phase = %phase,
            error = %err,
            "phase failed"
        );
        if let Err(hook_err) = self
            .db
            .run_state()
            .record_failure(ctx.log_id, phase, &err.to_string())
            .await
        {
            warn!(
                target: "lifecheck::sys",
                log_id = %ctx.log_id,
                error = %hook_err,
                "failed to record phase failure"
            );
        }
    }

    /// Phase 1: replace the subject table from the census.
    async fn pull_census(&self, ctx: &RunContext, phase: RunPhase) -> Result<Step> {
        if !matches!(
            phase,
            RunPhase::Idle | RunPhase::PullingCensus | RunPhase::Completed
        ) {
            return Ok(Step::Continue(phase));
        }

        self.transition(ctx, RunPhase::PullingCensus, None).await?;
        info!(target: "lifecheck::sys", log_id = %ctx.log_id, "pulling census data");

        let subjects: Vec<NewSubject> = self
            .db
            .census()
            .fetch_active_members()
            .await?
            .into_iter()
            .map(NewSubject::from)
            .collect();
        let total = subjects.len();
        let inserted = self.db.subjects().replace_all(subjects).await?;
        let inserted = i64::try_from(inserted).unwrap_or(i64::MAX);

        self.transition(ctx, RunPhase::CensusPulled, Some(inserted)).await?;
        info!(
            target: "lifecheck::sys",
            log_id = %ctx.log_id,
            census_rows = total,
            inserted,
            "census data pulled"
        );
        Ok(Step::Continue(RunPhase::CensusPulled))
    }

    /// Phase 3: verify pending subjects against the population registry.
    async fn check_population(
        &self,
        ctx: &RunContext,
        phase: RunPhase,
    ) -> Result<Step> {
        if !matches!(
            phase,
            RunPhase::CensusPulled | RunPhase::CheckingPopulation
        ) {
            return Ok(Step::Continue(phase));
        }

        let detail_id = self
            .transition(ctx, RunPhase::CheckingPopulation, None)
            .await?;
        info!(target: "lifecheck::checkpop", log_id = %ctx.log_id, "population check started");

        let check = PopulationCheck {
            subjects: self.db.subjects(),
            run_state: self.db.run_state(),
            registry: self.population.as_ref(),
            detail_id,
        };
        let outcome = self
            .converge(
                ctx,
                &check,
                CheckKind::Population,
                self.config.convergence.population_round_delay(),
            )
            .await?;

        match outcome {
            ConvergenceOutcome::Converged { rounds } => {
                self.transition(ctx, RunPhase::PopulationChecked, None)
                    .await?;
                info!(target: "lifecheck::checkpop", rounds, "population check complete");
                Ok(Step::Continue(RunPhase::PopulationChecked))
            }
            ConvergenceOutcome::Exhausted { remaining } => {
                Err(CoreError::NotConverged { remaining })
            }
            ConvergenceOutcome::Stopped => Ok(Step::Stopped),
        }
    }

    /// Phases 4-5: wait until an operator login yields an accepted token.
    /// The wait has no upper bound; only cancellation ends it early.
    async fn await_login(&self, ctx: &RunContext, phase: RunPhase) -> Result<Step> {
        if !matches!(
            phase,
            RunPhase::PopulationChecked | RunPhase::AwaitingLogin
        ) {
            return Ok(Step::Continue(phase));
        }

        if phase != RunPhase::AwaitingLogin {
            self.transition(ctx, RunPhase::AwaitingLogin, None).await?;
        }
        info!(target: "lifecheck::lk", log_id = %ctx.log_id, "waiting for registry login");

        let poll = self.config.login_wait.poll_interval();
        loop {
            if !ctx.cancel.should_continue() {
                return Ok(Step::Stopped);
            }

            match self.db.credentials().latest_active().await? {
                Some(credential)
                    if self.civil.token_accepted(&credential.token).await =>
                {
                    info!(
                        target: "lifecheck::lk",
                        subject_id = %credential.subject_id,
                        "registry token accepted"
                    );
                    return Ok(Step::Continue(RunPhase::CheckingCivilRegistry));
                }
                Some(credential) => {
                    debug!(
                        target: "lifecheck::lk",
                        subject_id = %credential.subject_id,
                        "registry token rejected"
                    );
                }
                None => {
                    debug!(target: "lifecheck::lk", "no active registry token");
                }
            }

            if ctx.cancel.sleep(poll).await.is_err() {
                return Ok(Step::Stopped);
            }
        }
    }

    /// Phase 6: verify remaining subjects against the civil registry.
    async fn check_civil_registry(
        &self,
        ctx: &RunContext,
        phase: RunPhase,
    ) -> Result<Step> {
        if !matches!(
            phase,
            RunPhase::CheckingCivilRegistry | RunPhase::CivilRegistryChecked
        ) {
            return Ok(Step::Continue(phase));
        }

        let detail_id = self
            .transition(ctx, RunPhase::CheckingCivilRegistry, None)
            .await?;
        info!(target: "lifecheck::lk", log_id = %ctx.log_id, "civil registry check started");

        let check = CivilRegistryCheck {
            subjects: self.db.subjects(),
            run_state: self.db.run_state(),
            credentials: self.db.credentials(),
            registry: self.civil.as_ref(),
            detail_id,
        };
        let outcome = self
            .converge(
                ctx,
                &check,
                CheckKind::CivilRegistry,
                self.config.convergence.registry_round_delay(),
            )
            .await?;

        match outcome {
            ConvergenceOutcome::Converged { rounds } => {
                self.transition(ctx, RunPhase::CivilRegistryChecked, None)
                    .await?;
                info!(target: "lifecheck::lk", rounds, "civil registry check complete");
                Ok(Step::Continue(RunPhase::CivilRegistryChecked))
            }
            ConvergenceOutcome::Exhausted { remaining } => {
                Err(CoreError::NotConverged { remaining })
            }
            ConvergenceOutcome::Stopped => Ok(Step::Stopped),
        }
    }

    /// Phase 7 to 8.
    async fn finish(&self, ctx: &RunContext, phase: RunPhase) -> Result<Step> {
        if phase != RunPhase::CivilRegistryChecked {
            return Ok(Step::Continue(phase));
        }

        self.transition(ctx, RunPhase::Completed, None).await?;
        info!(target: "lifecheck::sys", log_id = %ctx.log_id, "batch completed");
        Ok(Step::Continue(RunPhase::Completed))
    }

    async fn converge<C>(
        &self,
        ctx: &RunContext,
        check: &C,
        kind: CheckKind,
        round_delay: std::time::Duration,
    ) -> Result<ConvergenceOutcome>
    where
        C: RowCheck<Row = lifecheck_model::SubjectRecord>,
    {
        let subjects = self.db.subjects();
        let retry = &self.config.retry;
        let cancel = &ctx.cancel;

        verify_until_done(
            self.config.convergence.max_rounds,
            round_delay,
            cancel,
            move || subjects.count_remaining(kind),
            move |round| async move {
                let rows = subjects.pending_for(kind).await?;
                debug!(
                    target: "lifecheck::sys",
                    check = %kind,
                    round,
                    rows = rows.len(),
                    "verification round loaded rows"
                );
                process_rows(check, &rows, retry, cancel).await
            },
        )
        .await
    }
}

#[async_trait]
impl ProcessRunner for BatchOrchestrator {
    fn is_running(&self) -> bool {
        self.lease.is_held()
    }

    async fn run_process(&self, trigger: RunTrigger) -> RunOutcome {
        self.execute(trigger).await
    }
}
