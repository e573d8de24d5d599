//! Operator commands that act on the stores without running the scheduler.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use lifecheck_core::{
    database::{
        PostgresDatabase,
        ports::{
            credentials::CredentialRepository, run_lease::RunLeaseRepository,
            run_state::RunStateRepository,
        },
    },
    orchestration::{ProcessRunner, RunTrigger},
    scheduling::{ScheduleService, validate_windows},
};
use lifecheck_model::{
    CredentialToken, LogRun, RunResult, RunStatusReport, ScheduleWindow,
    ScheduleWindowInput, TokenStatus,
};
use tracing::info;

use crate::infra::app_context::AppContext;

/// Runs one batch in the foreground, stopping only on process shutdown.
pub async fn run_manual(context: &AppContext) -> RunResult {
    let outcome = context.orchestrator().run_process(RunTrigger::Manual).await;
    info!(target: "lifecheck::sys", result = outcome.message(), "manual run finished");
    RunResult::from(outcome)
}

/// Persisted phase and progress of the current attempt. `is_processing`
/// reflects the shared run lease, so a run in any process counts.
pub async fn status(postgres: &PostgresDatabase) -> Result<RunStatusReport> {
    let repo = postgres.run_state();
    let state = repo.load_state().await.context("failed to load run state")?;
    let log_id = state.and_then(|s| s.log_id);
    let details = match log_id {
        Some(id) => repo
            .log_details(id)
            .await
            .context("failed to load log details")?,
        None => Vec::new(),
    };
    let lease = postgres
        .run_lease()
        .current()
        .await
        .context("failed to load run lease")?;

    Ok(RunStatusReport {
        is_processing: lease.is_some(),
        phase: state.map(|s| s.phase),
        log_id,
        details,
    })
}

pub async fn history(postgres: &PostgresDatabase, limit: i64) -> Result<Vec<LogRun>> {
    postgres
        .run_state()
        .list_runs(limit.max(1))
        .await
        .context("failed to list runs")
}

pub async fn schedule_show(postgres: &PostgresDatabase) -> Result<Vec<ScheduleWindow>> {
    ScheduleService::new(Arc::new(postgres.schedule().clone()))
        .windows()
        .await
        .context("failed to load schedule")
}

/// Replaces the stored windows with the set in `path`; nothing is written
/// when any entry is invalid.
pub async fn schedule_set(
    postgres: &PostgresDatabase,
    path: &Path,
) -> Result<Vec<ScheduleWindow>> {
    let inputs = read_schedule_file(path)?;
    ScheduleService::new(Arc::new(postgres.schedule().clone()))
        .replace(&inputs)
        .await
        .context("schedule rejected")
}

/// Offline validation; touches no store.
pub fn schedule_validate(path: &Path) -> Result<Vec<ScheduleWindow>> {
    let inputs = read_schedule_file(path)?;
    validate_windows(&inputs).context("schedule rejected")
}

fn read_schedule_file(path: &Path) -> Result<Vec<ScheduleWindowInput>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse schedule file {}", path.display()))
}

/// Stores a token as if the external login callback had delivered it.
pub async fn credential_put(
    postgres: &PostgresDatabase,
    subject_id: String,
    token: String,
    status: &str,
) -> Result<()> {
    let status = TokenStatus::parse(status).context("invalid token status")?;
    let credential = CredentialToken {
        subject_id,
        token,
        status,
        updated_at: Utc::now(),
    };
    postgres
        .credentials()
        .upsert(&credential)
        .await
        .context("failed to store credential")?;
    info!(
        target: "lifecheck::lk",
        subject_id = %credential.subject_id,
        status = status.as_str(),
        "credential stored"
    );
    Ok(())
}
