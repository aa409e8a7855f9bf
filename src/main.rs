use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use sitecheck_lib::utils::logger::init_logging;
use sitecheck_lib::{run_offline, run_online, AppConfig, AppResult, RunOutcome};

#[derive(Parser)]
#[command(name = "sitecheck")]
#[command(about = "Reconciles closed quality checklists against tracker progress")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch from the document service and build the report
    Run {
        /// Path to the YAML configuration file
        #[arg(short, long, env = "SITECHECK_CONFIG", default_value = "sitecheck.yaml")]
        config: PathBuf,

        /// Tracker workbook export (JSON); defaults to the newest file in tracker.source_dir
        #[arg(long)]
        tracker: Option<PathBuf>,
    },
    /// Build the report from a captured upstream snapshot
    Offline {
        #[arg(short, long, env = "SITECHECK_CONFIG", default_value = "sitecheck.yaml")]
        config: PathBuf,

        /// Snapshot of upstream records (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        #[arg(long)]
        tracker: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli.command).await {
        Ok(outcome) => {
            println!("{}", outcome.report_path.display());
            if outcome.failed_datasets.is_empty() {
                ExitCode::SUCCESS
            } else {
                eprintln!("datasets not fetched: {}", outcome.failed_datasets.join(", "));
                ExitCode::from(2)
            }
        }
        Err(err) => {
            error!(target: "app::run", error = %err, "run failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command) -> AppResult<RunOutcome> {
    match command {
        Command::Run { config, tracker } => {
            let config = AppConfig::load(&config)?;
            init_logging(config.log_dir.as_deref())?;
            info!(target: "app::run", datasets = config.datasets.len(), "starting online run");
            run_online(config, tracker.as_deref()).await
        }
        Command::Offline {
            config,
            snapshot,
            tracker,
        } => {
            let config = AppConfig::load(&config)?;
            init_logging(config.log_dir.as_deref())?;
            info!(target: "app::run", snapshot = %snapshot.display(), "starting offline run");
            run_offline(config, &snapshot, tracker.as_deref()).await
        }
    }
}
