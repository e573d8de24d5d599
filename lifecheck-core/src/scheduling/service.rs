use std::sync::Arc;

use lifecheck_model::{ScheduleWindow, ScheduleWindowInput};
use tracing::info;

use super::validation::validate_windows;
use crate::database::ports::schedule::ScheduleRepository;
use crate::error::Result;

/// Read and replace the configured trigger windows.
#[derive(Clone)]
pub struct ScheduleService {
    repo: Arc<dyn ScheduleRepository>,
}

impl std::fmt::Debug for ScheduleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleService").finish_non_exhaustive()
    }
}

impl ScheduleService {
    pub fn new(repo: Arc<dyn ScheduleRepository>) -> Self {
        Self { repo }
    }

    /// Configured windows in evaluation order.
    pub async fn windows(&self) -> Result<Vec<ScheduleWindow>> {
        let mut windows = self.repo.list_windows().await?;
        windows.sort_by_key(ScheduleWindow::sort_key);
        Ok(windows)
    }

    /// Validates `inputs` as a whole and only then replaces the stored set.
    pub async fn replace(
        &self,
        inputs: &[ScheduleWindowInput],
    ) -> Result<Vec<ScheduleWindow>> {
        let windows = validate_windows(inputs)?;
        self.repo.replace_windows(windows.clone()).await?;
        info!(target: "lifecheck::cron", count = windows.len(), "schedule replaced");
        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use lifecheck_model::LooseInteger;

    use super::*;
    use crate::database::ports::schedule::MockScheduleRepository;
    use crate::error::CoreError;
    use crate::scheduling::validation::ScheduleValidationError;

    fn input(month: i64, time: &str) -> ScheduleWindowInput {
        ScheduleWindowInput {
            month: LooseInteger::Integer(month),
            day: LooseInteger::Integer(1),
            start_time: time.to_string(),
            duration_hours: LooseInteger::Integer(2),
        }
    }

    #[tokio::test]
    async fn invalid_set_never_reaches_the_repository() {
        let mut repo = MockScheduleRepository::new();
        repo.expect_replace_windows().never();
        let service = ScheduleService::new(Arc::new(repo));

        let err = service
            .replace(&[input(1, "02:00"), input(2, "25:00")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidSchedule(ScheduleValidationError::InvalidStartTime { index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn valid_set_is_stored_sorted() {
        let mut repo = MockScheduleRepository::new();
        repo.expect_replace_windows()
            .times(1)
            .withf(|windows| windows.len() == 2 && windows[0].month == 1)
            .returning(|_| Ok(()));
        let service = ScheduleService::new(Arc::new(repo));

        let stored = service
            .replace(&[input(5, "02:00"), input(1, "08:30")])
            .await
            .expect("replace");
        assert_eq!(stored[1].month, 5);
    }
}
