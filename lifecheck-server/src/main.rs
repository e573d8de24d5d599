//! # lifecheck
//!
//! Scheduled, resumable life status verification.
//!
//! The default command serves the trigger scheduler: once per tick it checks
//! the configured calendar windows and starts a batch run when one is open.
//! A run pulls the member census, checks every subject against the
//! population registry, waits for an operator login and then checks the
//! civil registry. Progress is persisted after every phase so an interrupted
//! run resumes where it stopped.
//!
//! Operator commands cover manual runs, status and history, schedule
//! management, credential delivery and database migrations.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use lifecheck_config::{ConfigLoad, ConfigLoader};
use lifecheck_server::{
    commands, db,
    infra::{app_context::AppContext, shutdown::cancel_on_ctrl_c, telemetry},
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "lifecheck-server")]
#[command(about = "Scheduled population and civil registry verification runner")]
struct Cli {
    /// Path to a TOML tuning file (overrides LIFECHECK_CONFIG_PATH)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the trigger scheduler until interrupted (default)
    Serve,
    /// Start a batch run now and print its result as JSON
    Run,
    /// Show the persisted phase and progress of the current attempt
    Status,
    /// List recent runs, newest first
    History {
        /// Number of runs to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    #[command(subcommand)]
    Schedule(ScheduleCommand),
    #[command(subcommand)]
    Credential(CredentialCommand),
    #[command(subcommand)]
    Db(DbCommand),
}

/// Manage the trigger windows
#[derive(Debug, Subcommand)]
enum ScheduleCommand {
    /// Print the stored windows in evaluation order
    Show,
    /// Replace all windows with the JSON array in FILE
    Set { file: PathBuf },
    /// Check a schedule file without touching the database
    Validate { file: PathBuf },
}

/// Manage civil registry credentials
#[derive(Debug, Subcommand)]
enum CredentialCommand {
    /// Store a bearer token for a subject, as the login callback would
    Put {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        token: String,
        /// ACTIVE, ACTIVED or EXPIRED
        #[arg(long, default_value = "ACTIVE")]
        status: String,
    },
}

/// Database maintenance
#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    if let Command::Schedule(ScheduleCommand::Validate { file }) = &command {
        let windows = commands::schedule_validate(file)?;
        return print_json(&windows);
    }

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;

    telemetry::init_tracing();
    telemetry::log_config_warnings(config.metadata.env_file_loaded, &warnings);
    if let Some(path) = config.config_path() {
        info!(path = %path.display(), "configuration file loaded");
    }

    let config = Arc::new(config);

    match command {
        Command::Serve => {
            let shutdown = CancellationToken::new();
            cancel_on_ctrl_c(shutdown.clone());
            let context = AppContext::build(config, shutdown.clone()).await?;
            context.scheduler().run(shutdown).await;
            Ok(())
        }
        Command::Run => {
            let shutdown = CancellationToken::new();
            cancel_on_ctrl_c(shutdown.clone());
            let context = AppContext::build(config, shutdown).await?;
            let result = commands::run_manual(&context).await;
            print_json(&result)?;
            if !result.ok {
                bail!("{}", result.state);
            }
            Ok(())
        }
        Command::Status => {
            let pg = db::connect_primary(&config).await?;
            print_json(&commands::status(&pg).await?)
        }
        Command::History { limit } => {
            let pg = db::connect_primary(&config).await?;
            print_json(&commands::history(&pg, limit).await?)
        }
        Command::Schedule(ScheduleCommand::Show) => {
            let pg = db::connect_primary(&config).await?;
            print_json(&commands::schedule_show(&pg).await?)
        }
        Command::Schedule(ScheduleCommand::Set { file }) => {
            let pg = db::connect_primary(&config).await?;
            print_json(&commands::schedule_set(&pg, &file).await?)
        }
        Command::Schedule(ScheduleCommand::Validate { .. }) => Ok(()),
        Command::Credential(CredentialCommand::Put {
            subject,
            token,
            status,
        }) => {
            let pg = db::connect_primary(&config).await?;
            commands::credential_put(&pg, subject, token, &status).await
        }
        Command::Db(DbCommand::Migrate) => {
            let pg = db::connect_primary(&config)
                .await
                .context("failed to connect to PostgreSQL for migration")?;
            pg.initialize_schema()
                .await
                .context("database migration failed")?;
            info!("Database migrations applied successfully");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered =
        serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
