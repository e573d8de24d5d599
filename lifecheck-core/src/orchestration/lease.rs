use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one run's claim on the lease, locally and in the store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct LeaseId(pub Uuid);

impl Default for LeaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaseId {
    /// Time-ordered id, so the newest claim sorts last.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

/// Process-wide single slot guaranteeing at most one batch run per
/// orchestrator. Runs across processes are kept apart by the store-backed
/// lease the orchestrator takes once this slot is held.
#[derive(Clone, Debug, Default)]
pub struct RunLease {
    held: Arc<AtomicBool>,
}

impl RunLease {
    /// Free slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the slot, or returns `None` when another run holds it.
    pub fn try_acquire(&self, owner: impl Into<String>) -> Option<RunLeaseGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        Some(RunLeaseGuard {
            lease_id: LeaseId::new(),
            lease_owner: owner.into(),
            acquired_at: Utc::now(),
            held: Arc::clone(&self.held),
        })
    }

    /// Whether a guard is currently alive.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Lease metadata; dropping the guard frees the slot on every exit path.
#[derive(Debug)]
pub struct RunLeaseGuard {
    /// Id also written to the shared lease row.
    pub lease_id: LeaseId,
    /// `manual` or `schedule:<window>`.
    pub lease_owner: String,
    /// Start of the run, used for its elapsed time.
    pub acquired_at: DateTime<Utc>,
    held: Arc<AtomicBool>,
}

impl Drop for RunLeaseGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
