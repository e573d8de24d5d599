//! Batch orchestration: the phase state machine plus its retry and
//! cancellation building blocks.

pub mod cancel;
pub mod config;
pub mod lease;
pub mod orchestrator;
pub mod retry;
pub mod verification;

pub use cancel::{RunCancellation, Stopped, WindowPredicate};
pub use config::{
    ConvergenceConfig, LoginWaitConfig, OrchestratorConfig, RetryConfig,
};
pub use lease::{LeaseId, RunLease, RunLeaseGuard};
pub use orchestrator::{BatchOrchestrator, ProcessRunner, RunContext, RunTrigger};
pub use retry::{
    AttemptError, ConvergenceOutcome, RetryOutcome, RoundOutcome, RoundSummary,
    RowCheck, process_rows, retry_with_backoff, verify_until_done,
};
pub use verification::{CivilRegistryCheck, PopulationCheck};
