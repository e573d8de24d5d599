//! In-memory port and registry fakes for orchestrator integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use lifecheck_core::database::DatabaseContext;
use lifecheck_core::database::ports::{
    census::CensusSource,
    credentials::CredentialRepository,
    run_lease::{RunLeaseRecord, RunLeaseRepository},
    run_state::RunStateRepository,
    schedule::ScheduleRepository,
    subjects::{CheckResolution, SubjectRepository},
};
use lifecheck_core::orchestration::{
    ConvergenceConfig, LeaseId, LoginWaitConfig, OrchestratorConfig,
    RetryConfig,
};
use lifecheck_core::providers::{
    CivilRecord, CivilRegistry, PopulationRegistry, ProviderError,
};
use lifecheck_core::{CoreError, Result};
use lifecheck_model::{
    CensusRecord, CheckKind, CheckStatus, CredentialToken, LogDetail,
    LogDetailId, LogRun, LogRunId, NewSubject, RunPhase, RunState,
    ScheduleWindow, SubjectId, SubjectRecord, SubjectStatus, TokenStatus,
    VitalCode,
};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Tables {
    run_state: Option<RunState>,
    log_runs: Vec<LogRun>,
    log_details: Vec<LogDetail>,
    subjects: Vec<SubjectRecord>,
    windows: Vec<ScheduleWindow>,
    credentials: Vec<CredentialToken>,
    census: Vec<CensusRecord>,
    lease: Option<RunLeaseRecord>,
}

/// One in-memory store implementing every repository port.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pub census_pulls: AtomicUsize,
    pub fail_census: AtomicBool,
}

impl MemoryStore {
    /// Store with the seeded idle run state, like a fresh migration.
    pub fn seeded() -> Arc<Self> {
        let store = Self::default();
        store.tables.lock().run_state = Some(RunState {
            phase: RunPhase::Idle,
            log_id: None,
        });
        Arc::new(store)
    }

    pub fn unseeded() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn context(self: &Arc<Self>) -> DatabaseContext {
        DatabaseContext::new(
            Arc::clone(self) as Arc<dyn RunStateRepository>,
            Arc::clone(self) as Arc<dyn RunLeaseRepository>,
            Arc::clone(self) as Arc<dyn SubjectRepository>,
            Arc::clone(self) as Arc<dyn ScheduleRepository>,
            Arc::clone(self) as Arc<dyn CredentialRepository>,
            Arc::clone(self) as Arc<dyn CensusSource>,
        )
    }

    pub fn set_census(&self, census: Vec<CensusRecord>) {
        self.tables.lock().census = census;
    }

    /// Puts the pipeline at `phase` inside a fresh attempt.
    pub fn set_phase(&self, phase: RunPhase) -> LogRunId {
        let mut tables = self.tables.lock();
        let id = LogRunId(tables.log_runs.len() as i64 + 1);
        let now = Utc::now();
        tables.log_runs.push(LogRun {
            id,
            phase,
            started_at: now,
            updated_at: now,
            last_error: None,
            failed_at: None,
        });
        tables.run_state = Some(RunState {
            phase,
            log_id: Some(id),
        });
        id
    }

    pub fn insert_subjects(&self, subjects: Vec<SubjectRecord>) {
        self.tables.lock().subjects.extend(subjects);
    }

    pub fn add_credential(&self, subject_id: &str, token: &str, status: TokenStatus) {
        self.tables.lock().credentials.push(CredentialToken {
            subject_id: subject_id.to_string(),
            token: token.to_string(),
            status,
            updated_at: Utc::now(),
        });
    }

    pub fn phase(&self) -> Option<RunPhase> {
        self.tables.lock().run_state.map(|s| s.phase)
    }

    pub fn run_state_snapshot(&self) -> Option<RunState> {
        self.tables.lock().run_state
    }

    pub fn subjects(&self) -> Vec<SubjectRecord> {
        self.tables.lock().subjects.clone()
    }

    pub fn subject(&self, cid: &str) -> Option<SubjectRecord> {
        self.tables
            .lock()
            .subjects
            .iter()
            .find(|s| s.cid == cid)
            .cloned()
    }

    pub fn log_runs(&self) -> Vec<LogRun> {
        self.tables.lock().log_runs.clone()
    }

    pub fn all_details(&self) -> Vec<LogDetail> {
        self.tables.lock().log_details.clone()
    }

    /// Lease row as stored, expired or not.
    pub fn lease_row(&self) -> Option<RunLeaseRecord> {
        self.tables.lock().lease.clone()
    }
}

fn expiry(ttl: Duration) -> chrono::DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX)
}

#[async_trait]
impl RunLeaseRepository for MemoryStore {
    async fn try_acquire(
        &self,
        lease_id: LeaseId,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        if tables.lease.as_ref().is_some_and(|l| l.expires_at > now) {
            return Ok(false);
        }
        tables.lease = Some(RunLeaseRecord {
            lease_id,
            lease_owner: owner.to_string(),
            acquired_at: now,
            expires_at: expiry(ttl),
        });
        Ok(true)
    }

    async fn renew(&self, lease_id: LeaseId, ttl: Duration) -> Result<bool> {
        let mut tables = self.tables.lock();
        match tables.lease.as_mut() {
            Some(lease) if lease.lease_id == lease_id => {
                lease.expires_at = expiry(ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, lease_id: LeaseId) -> Result<()> {
        let mut tables = self.tables.lock();
        if tables.lease.as_ref().is_some_and(|l| l.lease_id == lease_id) {
            tables.lease = None;
        }
        Ok(())
    }

    async fn current(&self) -> Result<Option<RunLeaseRecord>> {
        let now = Utc::now();
        Ok(self
            .tables
            .lock()
            .lease
            .clone()
            .filter(|l| l.expires_at > now))
    }
}

#[async_trait]
impl RunStateRepository for MemoryStore {
    async fn load_state(&self) -> Result<Option<RunState>> {
        Ok(self.tables.lock().run_state)
    }

    async fn create_log_run(&self) -> Result<LogRunId> {
        let mut tables = self.tables.lock();
        let id = LogRunId(tables.log_runs.len() as i64 + 1);
        let now = Utc::now();
        tables.log_runs.push(LogRun {
            id,
            phase: RunPhase::Idle,
            started_at: now,
            updated_at: now,
            last_error: None,
            failed_at: None,
        });
        Ok(id)
    }

    async fn record_transition(
        &self,
        log_id: LogRunId,
        phase: RunPhase,
        row_count: Option<i64>,
    ) -> Result<LogDetailId> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        let run = tables
            .log_runs
            .iter_mut()
            .find(|run| run.id == log_id)
            .ok_or_else(|| CoreError::Database(format!("log run {log_id} missing")))?;
        run.phase = phase;
        run.updated_at = now;

        tables.run_state = Some(RunState {
            phase,
            log_id: Some(log_id),
        });
        let id = LogDetailId(tables.log_details.len() as i64 + 1);
        tables.log_details.push(LogDetail {
            id,
            log_id,
            phase,
            row_count,
            checked_count: 0,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn increment_checked(&self, detail_id: LogDetailId) -> Result<()> {
        let mut tables = self.tables.lock();
        if let Some(detail) = tables.log_details.iter_mut().find(|d| d.id == detail_id) {
            detail.checked_count += 1;
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        log_id: LogRunId,
        phase: RunPhase,
        message: &str,
    ) -> Result<()> {
        let mut tables = self.tables.lock();
        if let Some(run) = tables.log_runs.iter_mut().find(|run| run.id == log_id) {
            run.last_error = Some(format!("[{}] {message}", phase.label()));
            run.failed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn log_details(&self, log_id: LogRunId) -> Result<Vec<LogDetail>> {
        Ok(self
            .tables
            .lock()
            .log_details
            .iter()
            .filter(|d| d.log_id == log_id)
            .cloned()
            .collect())
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<LogRun>> {
        let mut runs = self.tables.lock().log_runs.clone();
        runs.reverse();
        runs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(runs)
    }
}

fn is_candidate(subject: &SubjectRecord, kind: CheckKind) -> bool {
    match kind {
        CheckKind::Population => {
            subject.status == SubjectStatus::Pending
                && subject.status_checkpop.is_pending()
        }
        CheckKind::CivilRegistry => {
            subject.status == SubjectStatus::Pending && subject.status_lk.is_pending()
        }
    }
}

fn is_remaining(subject: &SubjectRecord, kind: CheckKind) -> bool {
    match kind {
        CheckKind::Population => subject.status_checkpop.is_pending(),
        CheckKind::CivilRegistry => is_candidate(subject, kind),
    }
}

fn check_column(subject: &mut SubjectRecord, kind: CheckKind) -> &mut CheckStatus {
    match kind {
        CheckKind::Population => &mut subject.status_checkpop,
        CheckKind::CivilRegistry => &mut subject.status_lk,
    }
}

#[async_trait]
impl SubjectRepository for MemoryStore {
    async fn replace_all(&self, subjects: Vec<NewSubject>) -> Result<u64> {
        let mut tables = self.tables.lock();
        tables.subjects = subjects
            .into_iter()
            .enumerate()
            .map(|(index, subject)| SubjectRecord {
                id: SubjectId(index as i64 + 1),
                cid: subject.cid,
                birth_date: subject.birth_date,
                member_code: subject.member_code,
                status: SubjectStatus::Pending,
                status_checkpop: subject.status_checkpop,
                status_lk: CheckStatus::Pending,
            })
            .collect();
        Ok(tables.subjects.len() as u64)
    }

    async fn pending_for(&self, kind: CheckKind) -> Result<Vec<SubjectRecord>> {
        Ok(self
            .tables
            .lock()
            .subjects
            .iter()
            .filter(|s| is_candidate(s, kind))
            .cloned()
            .collect())
    }

    async fn count_remaining(&self, kind: CheckKind) -> Result<i64> {
        Ok(self
            .tables
            .lock()
            .subjects
            .iter()
            .filter(|s| is_remaining(s, kind))
            .count() as i64)
    }

    async fn record_resolution(&self, resolution: &CheckResolution) -> Result<()> {
        let mut tables = self.tables.lock();
        let subject = tables
            .subjects
            .iter_mut()
            .find(|s| s.id == resolution.subject_id)
            .ok_or_else(|| CoreError::Database("subject missing".into()))?;
        *check_column(subject, resolution.kind) =
            CheckStatus::Resolved(resolution.code.clone());
        subject.status = resolution.code.subject_status();
        if let Some(birth_date) = resolution.birth_date {
            subject.birth_date = Some(birth_date);
        }
        Ok(())
    }

    async fn mark_check_failed(&self, subject_id: SubjectId, kind: CheckKind) -> Result<()> {
        let mut tables = self.tables.lock();
        if let Some(subject) = tables.subjects.iter_mut().find(|s| s.id == subject_id) {
            *check_column(subject, kind) = CheckStatus::Failed;
        }
        Ok(())
    }
}

#[async_trait]
impl ScheduleRepository for MemoryStore {
    async fn list_windows(&self) -> Result<Vec<ScheduleWindow>> {
        Ok(self.tables.lock().windows.clone())
    }

    async fn replace_windows(&self, windows: Vec<ScheduleWindow>) -> Result<()> {
        self.tables.lock().windows = windows;
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for MemoryStore {
    async fn latest_active(&self) -> Result<Option<CredentialToken>> {
        Ok(self
            .tables
            .lock()
            .credentials
            .iter()
            .filter(|c| c.status.is_active())
            .max_by_key(|c| c.updated_at)
            .cloned())
    }

    async fn upsert(&self, token: &CredentialToken) -> Result<()> {
        let mut tables = self.tables.lock();
        tables.credentials.retain(|c| c.subject_id != token.subject_id);
        tables.credentials.push(token.clone());
        Ok(())
    }
}

#[async_trait]
impl CensusSource for MemoryStore {
    async fn fetch_active_members(&self) -> Result<Vec<CensusRecord>> {
        self.census_pulls.fetch_add(1, Ordering::SeqCst);
        if self.fail_census.load(Ordering::SeqCst) {
            return Err(CoreError::Database("census unavailable".into()));
        }
        Ok(self.tables.lock().census.clone())
    }
}

/// Population registry answering from per-cid scripts.
///
/// Each call pops the next scripted answer; once a script is empty the
/// default answer is used.
#[derive(Debug)]
pub struct ScriptedPopulation {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<VitalCode, ProviderError>>>>,
    default: VitalCode,
    pub calls: AtomicUsize,
    /// Flipped to `false` once `close_after` calls have been answered.
    pub window_open: Arc<AtomicBool>,
    close_after: Option<usize>,
}

impl ScriptedPopulation {
    pub fn answering(default: VitalCode) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default,
            calls: AtomicUsize::new(0),
            window_open: Arc::new(AtomicBool::new(true)),
            close_after: None,
        }
    }

    pub fn script(
        self,
        cid: &str,
        answers: Vec<std::result::Result<VitalCode, ProviderError>>,
    ) -> Self {
        self.scripts
            .lock()
            .insert(cid.to_string(), answers.into_iter().collect());
        self
    }

    pub fn close_window_after(mut self, calls: usize) -> Self {
        self.close_after = Some(calls);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PopulationRegistry for ScriptedPopulation {
    async fn check(
        &self,
        cid: &str,
        _birth_date: NaiveDate,
    ) -> std::result::Result<VitalCode, ProviderError> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.close_after.is_some_and(|limit| calls >= limit) {
            self.window_open.store(false, Ordering::SeqCst);
        }

        self.scripts
            .lock()
            .get_mut(cid)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(self.default.clone()))
    }
}

/// Civil registry that accepts one token and answers every lookup the same,
/// except for cids set up to keep failing.
#[derive(Debug)]
pub struct FakeCivilRegistry {
    accepted_token: String,
    answer: CivilRecord,
    failing: HashSet<String>,
    pub lookups: AtomicUsize,
    pub probes: AtomicUsize,
}

impl FakeCivilRegistry {
    pub fn new(accepted_token: &str, answer: CivilRecord) -> Self {
        Self {
            accepted_token: accepted_token.to_string(),
            answer,
            failing: HashSet::new(),
            lookups: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        }
    }

    /// Every lookup for `cid` errors.
    pub fn failing_for(mut self, cid: &str) -> Self {
        self.failing.insert(cid.to_string());
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CivilRegistry for FakeCivilRegistry {
    async fn lookup(
        &self,
        cid: &str,
        token: &str,
    ) -> std::result::Result<CivilRecord, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if token != self.accepted_token {
            return Err(ProviderError::ApiError("token rejected".into()));
        }
        if self.failing.contains(cid) {
            return Err(ProviderError::ApiError("lookup timed out".into()));
        }
        Ok(self.answer.clone())
    }

    async fn token_accepted(&self, token: &str) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        token == self.accepted_token
    }
}

/// Millisecond-scale settings so retries and polls do not slow tests.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry: RetryConfig {
            max_attempts: 3,
            delay_ms: 1,
        },
        convergence: ConvergenceConfig {
            max_rounds: 5,
            population_round_delay_ms: 0,
            registry_round_delay_ms: 1,
        },
        login_wait: LoginWaitConfig {
            poll_interval_ms: 5,
        },
        cancellation_poll_ms: 1,
        lease_ttl_ms: 60_000,
    }
}

pub fn census_row(cid: &str, birth_date: Option<NaiveDate>) -> CensusRecord {
    CensusRecord {
        cid: cid.to_string(),
        birth_date,
        member_code: format!("M-{cid}"),
    }
}

pub fn pending_subject(id: i64, cid: &str) -> SubjectRecord {
    SubjectRecord {
        id: SubjectId(id),
        cid: cid.to_string(),
        birth_date: NaiveDate::from_ymd_opt(1960, 1, 1),
        member_code: format!("M-{cid}"),
        status: SubjectStatus::Pending,
        status_checkpop: CheckStatus::Pending,
        status_lk: CheckStatus::Pending,
    }
}
