use clap::{Parser, Subcommand};
use spiral_pool_core::ConfigLoader;
use std::path::PathBuf;

mod amounts;
mod commands;
mod report;
mod scenario;

use commands::{ScheduleArgs, SimulateArgs};

#[derive(Parser)]
#[command(name = "spiral")]
#[command(about = "Spiral pool simulator", long_about = None)]
struct Cli {
    /// Config file path (defaults to config/Config.toml plus SPIRAL_ env vars)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted pool scenario and print the resulting report
    Simulate(SimulateArgs),
    /// Print the cycle schedule of a scenario's pool
    Schedule(ScheduleArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    if let Some(path) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };

    match cli.command {
        Commands::Simulate(args) => {
            commands::run_simulate(args, config).await?;
        }
        Commands::Schedule(args) => {
            commands::run_schedule(&args, &config)?;
        }
    }

    Ok(())
}
