use crate::report::print_schedule;
use crate::scenario::Scenario;
use anyhow::Result;
use clap::Args;
use spiral_pool_engine::SpiralPool;
use spiral_pool_core::AppConfig;
use std::path::PathBuf;

/// Arguments for the schedule command.
#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    /// Scenario TOML file (only the [pool] table is read)
    #[arg(short, long)]
    pub scenario: PathBuf,

    /// Print the schedule as JSON
    #[arg(long)]
    pub json: bool,
}

/// Prints every cycle's opening, bidding deadline and end.
///
/// # Errors
/// Returns an error if the scenario cannot be loaded or its pool is invalid.
pub fn run_schedule(args: &ScheduleArgs, config: &AppConfig) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let pool = SpiralPool::from_config(scenario.pool.to_params()?, &config.engine)?;
    let cycles = pool.schedule();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&cycles)?);
    } else {
        print_schedule(pool.params(), &cycles);
    }
    Ok(())
}
