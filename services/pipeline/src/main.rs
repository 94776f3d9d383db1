//! Wildfire/climate pipeline runner.
//!
//! Keeps the bronze partition files in step with the upstream providers,
//! loads them into Postgres, rebuilds the yearly summary and renders the
//! gold outputs. Each subcommand is one stage; `run` executes the graph.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use climate_common::{DatasetKind, Partition};
use climate_pipeline::{Executor, PipelineConfig, PipelineStages, RetryPolicy, Stage, StageStatus};
use storage::{ArchiveMirror, FetchLedger, SqliteLedger};

#[derive(Parser, Debug)]
#[command(name = "climate-pipeline")]
#[command(about = "Incremental wildfire and climate ELT pipeline")]
struct Args {
    /// Pipeline configuration file
    #[arg(long, env = "PIPELINE_CONFIG", default_value = "config/pipeline.yaml", global = true)]
    config: PathBuf,

    /// Override the configured storage root
    #[arg(long, env = "STORAGE_ROOT", global = true)]
    storage_root: Option<PathBuf>,

    /// Override the configured ledger path
    #[arg(long, env = "LEDGER_PATH", global = true)]
    ledger: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full graph with per-stage retry
    Run,
    /// Sync the temperature snapshot for the current year
    FetchTemperature,
    /// Sync the configured fire years
    FetchFires,
    /// Load fetched files into the raw tables
    Load,
    /// Rebuild the yearly summary and export the gold CSV
    Transform,
    /// Render the chart from the gold CSV
    Visualize,
    /// Upload storage root files missing from the archive bucket
    Archive,
    /// Inspect or edit the fetch ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerCommand,
    },
}

#[derive(Subcommand, Debug)]
enum LedgerCommand {
    /// List fetched partitions
    List {
        #[arg(long)]
        kind: Option<DatasetKind>,
    },
    /// Forget a partition so the next run fetches it again
    Forget {
        #[arg(long)]
        kind: DatasetKind,
        #[arg(long)]
        year: i32,
    },
}

impl Command {
    fn stage(&self) -> Option<Stage> {
        match self {
            Command::FetchTemperature => Some(Stage::FetchTemperature),
            Command::FetchFires => Some(Stage::FetchFires),
            Command::Load => Some(Stage::Load),
            Command::Transform => Some(Stage::Transform),
            Command::Visualize => Some(Stage::Visualize),
            _ => None,
        }
    }
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal, stopping after the current partition");
        token.cancel();
    });
    cancel
}

async fn open_ledger(path: &Path) -> Result<Arc<SqliteLedger>> {
    let ledger = SqliteLedger::open(path)
        .await
        .with_context(|| format!("Failed to open fetch ledger: {}", path.display()))?;
    Ok(Arc::new(ledger))
}

async fn run_ledger_command(ledger: &SqliteLedger, action: LedgerCommand) -> Result<()> {
    match action {
        LedgerCommand::List { kind } => {
            let kinds = match kind {
                Some(kind) => vec![kind],
                None => vec![DatasetKind::Temperature, DatasetKind::Fire],
            };
            for kind in kinds {
                for record in ledger.list(kind).await? {
                    println!(
                        "{}\t{}\t{}\t{}\t{}",
                        record.partition.kind,
                        record.partition.year,
                        record.size_bytes,
                        record.fetched_at.to_rfc3339(),
                        record.location
                    );
                }
            }
        }
        LedgerCommand::Forget { kind, year } => {
            if ledger.forget(&Partition::new(kind, year)).await? {
                info!(kind = %kind, year, "Forgot partition");
            } else {
                info!(kind = %kind, year, "Partition was not in the ledger");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs)?;

    let mut config = PipelineConfig::load(&args.config)?;
    if let Some(root) = args.storage_root {
        config.storage_root = root;
    }
    if let Some(ledger) = args.ledger {
        config.ledger_path = ledger;
    }

    info!(
        storage_root = %config.storage_root.display(),
        ledger = %config.ledger_path.display(),
        "Starting climate pipeline"
    );

    if let Command::Archive = args.command {
        let mirror = ArchiveMirror::s3(&config.archive, &config.storage_root)?;
        let report = mirror.sync().await;
        if !report.is_clean() {
            bail!("{} files could not be archived", report.failed);
        }
        return Ok(());
    }

    let ledger = open_ledger(&config.ledger_path).await?;

    let result = match args.command {
        Command::Ledger { action } => run_ledger_command(&ledger, action).await,
        command => {
            let retry = config.retry.policy();
            let stages = Arc::new(PipelineStages::new(config, ledger.clone()));
            let cancel = shutdown_token();

            match command.stage() {
                Some(stage) => {
                    let executor = Executor::new(stages, RetryPolicy::none());
                    let report = executor.run_stage(stage, &cancel).await;
                    match report.status {
                        StageStatus::Failed(e) => {
                            Err(anyhow!(e).context(format!("Stage {} failed", stage)))
                        }
                        _ => Ok(()),
                    }
                }
                None => {
                    let executor = Executor::new(stages, retry);
                    let report = executor.run_graph(&cancel).await;
                    for stage in &report.stages {
                        match &stage.status {
                            StageStatus::Succeeded(summary) => {
                                info!(stage = %stage.stage, attempts = stage.attempts, "{}", summary)
                            }
                            StageStatus::Failed(e) => {
                                info!(stage = %stage.stage, attempts = stage.attempts, error = %e, "failed")
                            }
                            StageStatus::Skipped => info!(stage = %stage.stage, "skipped"),
                        }
                    }
                    let result = match report.failures().next() {
                        Some(failed) => Err(anyhow!("Stage {} failed", failed.stage)),
                        None => Ok(()),
                    };
                    result
                }
            }
        }
    };

    ledger.close().await;
    result
}
