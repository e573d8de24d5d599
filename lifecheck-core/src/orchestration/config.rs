use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Knobs that tune the batch orchestrator.
///
/// All fields carry defaults so deployments only override what they need.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Per-subject retry policy for registry calls.
    pub retry: RetryConfig,
    /// Round limits for the verify-until-done loops.
    pub convergence: ConvergenceConfig,
    /// Credential polling while waiting for an operator login.
    pub login_wait: LoginWaitConfig,
    /// Longest slice a cancellable sleep waits before re-checking the
    /// window predicate.
    pub cancellation_poll_ms: u64,
    /// How long the shared run lease stays valid without a renewal.
    pub lease_ttl_ms: u64,
}

impl OrchestratorConfig {
    /// Clamped to at least 1ms.
    pub fn cancellation_poll(&self) -> Duration {
        Duration::from_millis(self.cancellation_poll_ms.max(1))
    }

    /// Clamped to at least 1ms.
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms.max(1))
    }

    /// Renewal cadence; three renewals fit in one TTL.
    pub fn lease_heartbeat(&self) -> Duration {
        Duration::from_millis((self.lease_ttl_ms / 3).max(1))
    }
}

/// Per-subject retry policy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total calls per subject, the first one included.
    pub max_attempts: u16,
    /// Fixed pause between two calls for the same subject.
    pub delay_ms: u64,
}

impl RetryConfig {
    /// Fixed pause between attempts.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 60_000,
        }
    }
}

/// Limits of the verify-until-done loops.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Rounds per verification phase before it gives up.
    pub max_rounds: u16,
    /// Pause between population registry rounds.
    pub population_round_delay_ms: u64,
    /// Pause between civil registry rounds.
    pub registry_round_delay_ms: u64,
}

impl ConvergenceConfig {
    pub fn population_round_delay(&self) -> Duration {
        Duration::from_millis(self.population_round_delay_ms)
    }

    pub fn registry_round_delay(&self) -> Duration {
        Duration::from_millis(self.registry_round_delay_ms)
    }
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            population_round_delay_ms: 0,
            registry_round_delay_ms: 60_000,
        }
    }
}

/// Credential polling during the login wait.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoginWaitConfig {
    /// Pause between two credential checks. Zero is treated as 1ms.
    pub poll_interval_ms: u64,
}

impl LoginWaitConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for LoginWaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            convergence: ConvergenceConfig::default(),
            login_wait: LoginWaitConfig::default(),
            cancellation_poll_ms: 1_000,
            lease_ttl_ms: 120_000,
        }
    }
}
