use std::{fmt, sync::Arc};

use anyhow::{Context, Result, anyhow};
use lifecheck_config::Config;
use lifecheck_core::{
    database::{DatabaseContext, PostgresDatabase, connect_census},
    orchestration::BatchOrchestrator,
    providers::{
        CivilRegistry, CivilRegistryEndpoints, HttpCivilRegistry,
        HttpPopulationRegistry, PopulationRegistry,
    },
    scheduling::{LocalClock, SchedulerConfig, TriggerScheduler},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::db;

/// Fully wired runtime: both stores, both registries and the orchestrator.
#[derive(Clone)]
pub struct AppContext {
    config: Arc<Config>,
    postgres: Arc<PostgresDatabase>,
    database: DatabaseContext,
    orchestrator: Arc<BatchOrchestrator>,
    shutdown: CancellationToken,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("postgres", &self.postgres)
            .field("shutdown_cancelled", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    pub async fn build(
        config: Arc<Config>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let postgres = Arc::new(db::connect_primary(&config).await?);

        let census_url = config.require_census_url()?;
        db::validate_database_url(census_url)
            .context("invalid CENSUS_DATABASE_URL")?;
        let census = connect_census(
            census_url,
            db::pool_settings(&config),
            config.database.census_query.as_deref(),
        )
        .await
        .context("failed to connect to census database")?;

        let database =
            DatabaseContext::from_postgres(&postgres, Arc::new(census));
        let population = population_registry(&config)?;
        let civil = civil_registry(&config)?;

        let orchestrator = Arc::new(BatchOrchestrator::new(
            database.clone(),
            population,
            civil,
            config.orchestrator.clone(),
            shutdown.clone(),
        ));

        info!(
            target: "lifecheck::sys",
            {
                retry.max_attempts = config.orchestrator.retry.max_attempts,
                convergence.max_rounds = config.orchestrator.convergence.max_rounds,
                registry.timeout = ?config.registry.timeout,
            },
            "orchestrator configuration in effect"
        );

        Ok(Self {
            config,
            postgres,
            database,
            orchestrator,
            shutdown,
        })
    }

    pub fn orchestrator(&self) -> &Arc<BatchOrchestrator> {
        &self.orchestrator
    }

    /// Scheduler driving the orchestrator from the configured windows.
    pub fn scheduler(&self) -> Arc<TriggerScheduler> {
        let settings = self.config.scheduler;
        Arc::new(TriggerScheduler::new(
            self.database.schedule_handle(),
            self.database.run_state_handle(),
            self.orchestrator.clone(),
            Arc::new(LocalClock),
            SchedulerConfig {
                tick_interval: settings.tick_interval,
                initial_delay: settings.initial_delay,
            },
        ))
    }
}

fn population_registry(config: &Config) -> Result<Arc<dyn PopulationRegistry>> {
    let url = config
        .registry
        .population_url
        .clone()
        .ok_or_else(|| anyhow!("POPULATION_CHECK_URL is required to run"))?;
    let registry = HttpPopulationRegistry::new(url, config.registry.timeout)
        .context("failed to build population registry client")?;
    Ok(Arc::new(registry))
}

fn civil_registry(config: &Config) -> Result<Arc<dyn CivilRegistry>> {
    let registry = &config.registry;
    let base = registry
        .civil_api_url
        .as_ref()
        .ok_or_else(|| anyhow!("LK_API_URL is required to run"))?;
    let token_check_url = registry
        .civil_token_check_url
        .clone()
        .ok_or_else(|| anyhow!("LK_TOKEN_CHECK_URL is required to run"))?;
    let job_id = registry
        .civil_job_id
        .clone()
        .ok_or_else(|| anyhow!("LK_JOB_ID is required to run"))?;

    let endpoints =
        CivilRegistryEndpoints::from_base(base.as_str(), token_check_url, job_id)
            .context("invalid civil registry endpoints")?;
    let client = HttpCivilRegistry::new(endpoints, registry.timeout)
        .context("failed to build civil registry client")?;
    Ok(Arc::new(client))
}
