//! P8 Train - fine-tune and deploy the schematic component detector.
//!
//! Running `p8-train` with no subcommand performs a full training run:
//! pick a device, pick a seed checkpoint, train, promote the best checkpoint.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{dataset, doctor, run, status};

/// P8 Train - PLC / terminal / contactor detector training
#[derive(Parser, Debug)]
#[command(
    name = "p8-train",
    author,
    version,
    about = "Fine-tune the P8 schematic detector and deploy the best checkpoint"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file (defaults to ./p8-train.toml, then built-in values)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train and promote the best checkpoint (default)
    Run {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the deployed checkpoint and its manifest
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write dataset.yaml for a dataset root containing classes.txt
    Dataset {
        /// Dataset root directory
        root: PathBuf,
    },

    /// Check trainer, accelerator and configured paths
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins over --log-level. Logs go to stderr so stdout stays machine-readable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = args.config;
    match args.command.unwrap_or(Command::Run { json: false }) {
        Command::Run { json } => run::execute(config_path.as_deref(), json).await?,
        Command::Status { json } => status::execute(config_path.as_deref(), json).await?,
        Command::Dataset { root } => dataset::execute(&root).await?,
        Command::Doctor { json } => doctor::execute(config_path.as_deref(), json).await?,
    }

    Ok(())
}
