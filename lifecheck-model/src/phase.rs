use std::fmt;

use crate::error::{ModelError, Result};

/// Persisted progress marker of a batch run.
///
/// The numeric codes are stored in `run_state.phase`, `log_runs.phase` and
/// `log_details.phase`; they must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunPhase {
    Idle,
    PullingCensus,
    CensusPulled,
    CheckingPopulation,
    PopulationChecked,
    AwaitingLogin,
    CheckingCivilRegistry,
    CivilRegistryChecked,
    Completed,
}

impl RunPhase {
    pub const ALL: [RunPhase; 9] = [
        RunPhase::Idle,
        RunPhase::PullingCensus,
        RunPhase::CensusPulled,
        RunPhase::CheckingPopulation,
        RunPhase::PopulationChecked,
        RunPhase::AwaitingLogin,
        RunPhase::CheckingCivilRegistry,
        RunPhase::CivilRegistryChecked,
        RunPhase::Completed,
    ];

    pub fn code(self) -> i16 {
        match self {
            RunPhase::Idle => 0,
            RunPhase::PullingCensus => 1,
            RunPhase::CensusPulled => 2,
            RunPhase::CheckingPopulation => 3,
            RunPhase::PopulationChecked => 4,
            RunPhase::AwaitingLogin => 5,
            RunPhase::CheckingCivilRegistry => 6,
            RunPhase::CivilRegistryChecked => 7,
            RunPhase::Completed => 8,
        }
    }

    pub fn from_code(code: i16) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.code() == code)
            .ok_or(ModelError::UnknownPhase(code))
    }

    /// Human readable label used by history listings and logs.
    pub fn label(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::PullingCensus => "pulling census data",
            RunPhase::CensusPulled => "census data pulled",
            RunPhase::CheckingPopulation => "checking population registry",
            RunPhase::PopulationChecked => "population registry checked",
            RunPhase::AwaitingLogin => "waiting for registry login",
            RunPhase::CheckingCivilRegistry => "checking civil registry",
            RunPhase::CivilRegistryChecked => "civil registry checked",
            RunPhase::Completed => "completed",
        }
    }

    /// Phases from which a run starts a fresh attempt with a new log.
    pub fn starts_new_attempt(self) -> bool {
        matches!(self, RunPhase::Idle | RunPhase::Completed)
    }

    /// The batch finished; the scheduler waits for the next start day.
    pub fn is_terminal(self) -> bool {
        self == RunPhase::Completed
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_from_code() {
        for phase in RunPhase::ALL {
            assert_eq!(RunPhase::from_code(phase.code()), Ok(phase));
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(RunPhase::from_code(9), Err(ModelError::UnknownPhase(9)));
        assert_eq!(
            RunPhase::from_code(-1),
            Err(ModelError::UnknownPhase(-1))
        );
    }

    #[test]
    fn fresh_attempts_begin_from_idle_or_completed() {
        let fresh: Vec<_> = RunPhase::ALL
            .into_iter()
            .filter(|phase| phase.starts_new_attempt())
            .collect();
        assert_eq!(fresh, vec![RunPhase::Idle, RunPhase::Completed]);
    }
}
