mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pushload_engine::LoadError;

use crate::logging::LogFormat;

#[derive(Parser)]
#[command(
    name = "pushload",
    version,
    about = "Load CSV tables into a push dataset under the destination's rate limit"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the dataset and load every input table
    Run {
        /// Path to job YAML file
        job: PathBuf,
        /// Run against an in-memory destination with a simulated clock
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate the job and resolve the dataset without writing
    Check {
        /// Path to job YAML file
        job: PathBuf,
    },
    /// Print the dataset creation payload (offline)
    Schema {
        /// Path to job YAML file
        job: PathBuf,
    },
    /// Delete the configured dataset
    Drop {
        /// Path to job YAML file
        job: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(&cli.log_level, cli.log_format);

    let result = match cli.command {
        Commands::Run { job, dry_run } => commands::run::execute(&job, dry_run).await,
        Commands::Check { job } => commands::check::execute(&job).await,
        Commands::Schema { job } => commands::schema::execute(&job),
        Commands::Drop { job } => commands::drop::execute(&job).await,
    };

    ExitCode::from(exit_status(&result))
}

/// Log a failed command once and map it to the process exit status.
fn exit_status(result: &anyhow::Result<()>) -> u8 {
    let Err(err) = result else {
        return 0;
    };
    match err.downcast_ref::<LoadError>().and_then(LoadError::as_push_error) {
        Some(push) => tracing::error!(
            category = %push.category,
            code = %push.code,
            status = push.status,
            "{}",
            push.message
        ),
        None => tracing::error!("{err:#}"),
    }
    1
}
