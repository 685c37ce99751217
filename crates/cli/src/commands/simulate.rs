//! Runs a scripted scenario through a pool actor.

use crate::amounts::{parse_amount, parse_rate};
use crate::report::{SimulationReport, StepRecord, StepResult};
use crate::scenario::{Scenario, Step};
use anyhow::{bail, Context, Result};
use clap::Args;
use spiral_pool_core::{Address, AppConfig, Clock, ManualClock, ManualRate, PoolParams};
use spiral_pool_orchestrator::{OrchestratorError, PoolHandle, PoolRegistry};
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the simulate command.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Scenario TOML file
    #[arg(short, long)]
    pub scenario: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Stop at the first rejected step
    #[arg(long)]
    pub strict: bool,
}

struct Driver {
    handle: PoolHandle,
    clock: Arc<ManualClock>,
    rates: Arc<ManualRate>,
    params: PoolParams,
}

impl Driver {
    /// Applies one step. The outer error aborts the run; the inner one is an
    /// engine rejection recorded in the report.
    async fn apply(&self, step: &Step) -> Result<Result<StepResult, OrchestratorError>> {
        let decimals = self.params.base_token.decimals;
        let handle = &self.handle;
        let result = match step {
            Step::Advance { seconds } => {
                self.clock.advance(*seconds);
                Ok(StepResult::ClockMoved {
                    to: self.clock.now(),
                })
            }
            Step::Goto { offset } => {
                let target = Scenario::offset_time(self.params.start_time, *offset);
                if target < self.clock.now() {
                    bail!("goto offset {offset} moves the clock backwards");
                }
                self.clock.set(target);
                Ok(StepResult::ClockMoved { to: target })
            }
            Step::SetRate { rate } => {
                let rate = parse_rate(rate)?;
                self.rates.set(rate);
                Ok(StepResult::RateSet { rate })
            }
            Step::Join { owner } => handle
                .join_pool(Address::new(owner.clone()))
                .await
                .map(|position_id| StepResult::Joined { position_id }),
            Step::Deposit { position } => handle
                .deposit_cycle(*position)
                .await
                .map(|amount| StepResult::Deposited { amount }),
            Step::Bid { position, amount } => {
                let amount = parse_amount(amount, decimals)
                    .with_context(|| format!("bid amount for position {position}"))?;
                handle
                    .bid_cycle(*position, amount)
                    .await
                    .map(|()| StepResult::BidPlaced)
            }
            Step::Finalize => handle
                .finalize_cycle()
                .await
                .map(|outcome| StepResult::Finalized { outcome }),
            Step::ClaimCollateralYield { position } => handle
                .claim_collateral_yield(*position)
                .await
                .map(|claim| StepResult::Claimed { claim }),
            Step::ClaimSpiralYield { position } => handle
                .claim_spiral_yield(*position)
                .await
                .map(|claim| StepResult::Claimed { claim }),
            Step::Redeem { position } => handle
                .redeem_collateral_if_discarded(*position)
                .await
                .map(|redemption| StepResult::Redeemed { redemption }),
            Step::Withdraw { position } => handle
                .withdraw_collateral(*position)
                .await
                .map(|redemption| StepResult::Redeemed { redemption }),
        };

        if let Err(OrchestratorError::ActorStopped(id)) = &result {
            bail!("pool {id} stopped unexpectedly");
        }
        Ok(result)
    }
}

/// Runs `scenario` to completion and collects the report.
///
/// # Errors
/// Returns an error for malformed scenarios, or for the first rejected step
/// when `strict` is set.
pub async fn simulate(
    scenario: &Scenario,
    config: AppConfig,
    strict: bool,
) -> Result<SimulationReport> {
    let params = scenario.pool.to_params()?;
    let clock = Arc::new(ManualClock::new(Scenario::offset_time(
        params.start_time,
        scenario.clock_offset,
    )));
    let rates = Arc::new(ManualRate::new(scenario.initial_rate()?));
    let registry = PoolRegistry::new(config, clock.clone(), rates.clone());
    let handle = registry
        .spawn_pool(params.clone())
        .await
        .context("Failed to create pool")?;
    let mut events = handle.subscribe_events();

    tracing::info!(
        pool_id = %params.id,
        steps = scenario.steps.len(),
        "Running scenario"
    );

    let driver = Driver {
        handle,
        clock,
        rates,
        params,
    };
    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let outcome = driver
            .apply(step)
            .await
            .with_context(|| format!("step #{index} ({})", step.name()))?;
        let record = match outcome {
            Ok(result) => StepRecord {
                index,
                at: driver.clock.now(),
                action: step.name(),
                result: Some(result),
                error: None,
                error_kind: None,
            },
            Err(err) => {
                if strict {
                    bail!("step #{index} ({}) rejected: {err}", step.name());
                }
                StepRecord {
                    index,
                    at: driver.clock.now(),
                    action: step.name(),
                    result: None,
                    error_kind: err.pool_error().map(spiral_pool_core::PoolError::kind),
                    error: Some(err.to_string()),
                }
            }
        };
        steps.push(record);
    }

    let snapshot = driver.handle.refresh().await?;
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    registry.shutdown_all().await;

    Ok(SimulationReport {
        steps,
        events: collected,
        snapshot,
    })
}

/// Runs the simulate command.
///
/// # Errors
/// Returns an error if the scenario cannot be loaded or run.
pub async fn run_simulate(args: SimulateArgs, config: AppConfig) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let report = simulate(&scenario, config, args.strict).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }
    Ok(())
}
