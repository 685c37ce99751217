//! Scripted pool scenarios loaded from TOML.
//!
//! ```toml
//! [pool]
//! id = "demo"
//! amount_cycle = "100"
//! ...
//!
//! [[steps]]
//! action = "join"
//! owner = "0xalice"
//! ```

use crate::amounts::{parse_amount, parse_rate, parse_time};
use anyhow::{Context, Result};
use figment::providers::{Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use spiral_pool_core::{AssetRef, PoolParams, PositionId, Rate, Timestamp};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetSpec {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
}

impl From<&AssetSpec> for AssetRef {
    fn from(spec: &AssetSpec) -> Self {
        Self::new(spec.symbol.clone(), spec.address.clone(), spec.decimals)
    }
}

/// Pool parameters with human-readable amounts and times.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolSpec {
    pub id: String,
    pub base_token: AssetSpec,
    pub ybt: AssetSpec,
    pub spiral_yield_token: AssetSpec,
    /// Decimal amount of base token per cycle.
    pub amount_cycle: String,
    /// Decimal base value of the collateral each position locks.
    pub amount_collateral_in_base: String,
    pub cycle_duration: u64,
    pub cycle_deposit_and_bid_duration: u64,
    pub total_cycles: u32,
    /// RFC 3339 or epoch seconds.
    pub start_time: String,
}

impl PoolSpec {
    /// Converts to engine parameters.
    ///
    /// # Errors
    /// Returns an error if an amount or the start time does not parse.
    pub fn to_params(&self) -> Result<PoolParams> {
        let decimals = self.base_token.decimals;
        Ok(PoolParams {
            id: self.id.clone(),
            base_token: (&self.base_token).into(),
            ybt: (&self.ybt).into(),
            spiral_yield_token: (&self.spiral_yield_token).into(),
            amount_cycle: parse_amount(&self.amount_cycle, decimals)
                .context("pool.amount_cycle")?,
            amount_collateral_in_base: parse_amount(&self.amount_collateral_in_base, decimals)
                .context("pool.amount_collateral_in_base")?,
            cycle_duration: self.cycle_duration,
            cycle_deposit_and_bid_duration: self.cycle_deposit_and_bid_duration,
            total_cycles: self.total_cycles,
            total_positions: self.total_cycles,
            start_time: parse_time(&self.start_time).context("pool.start_time")?,
        })
    }
}

/// One scripted action.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Move the clock forward.
    Advance { seconds: u64 },
    /// Move the clock to `start_time + offset` (offset may be negative).
    Goto { offset: i64 },
    /// Change the YBT rate (base per YBT, decimal).
    SetRate { rate: String },
    Join { owner: String },
    Deposit { position: PositionId },
    /// Bid amount is a decimal in base units.
    Bid { position: PositionId, amount: String },
    Finalize,
    ClaimCollateralYield { position: PositionId },
    ClaimSpiralYield { position: PositionId },
    Redeem { position: PositionId },
    Withdraw { position: PositionId },
}

impl Step {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::Goto { .. } => "goto",
            Self::SetRate { .. } => "set_rate",
            Self::Join { .. } => "join",
            Self::Deposit { .. } => "deposit",
            Self::Bid { .. } => "bid",
            Self::Finalize => "finalize",
            Self::ClaimCollateralYield { .. } => "claim_collateral_yield",
            Self::ClaimSpiralYield { .. } => "claim_spiral_yield",
            Self::Redeem { .. } => "redeem",
            Self::Withdraw { .. } => "withdraw",
        }
    }
}

fn default_initial_rate() -> String {
    "1".to_string()
}

const fn default_clock_offset() -> i64 {
    -60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    pub pool: PoolSpec,
    /// YBT rate before any `set_rate` step.
    #[serde(default = "default_initial_rate")]
    pub initial_rate: String,
    /// Clock start relative to the pool start, in seconds.
    #[serde(default = "default_clock_offset")]
    pub clock_offset: i64,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Loads a scenario file.
    ///
    /// # Errors
    /// Returns an error if the file is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("scenario file {} not found", path.display());
        }
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    /// # Errors
    /// Returns an error if the initial rate does not parse.
    pub fn initial_rate(&self) -> Result<Rate> {
        parse_rate(&self.initial_rate).context("initial_rate")
    }

    /// Resolves `start_time + offset`, clamped at zero.
    #[must_use]
    pub fn offset_time(start_time: Timestamp, offset: i64) -> Timestamp {
        if offset >= 0 {
            start_time.saturating_add(offset.unsigned_abs())
        } else {
            start_time.saturating_sub(offset.unsigned_abs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const SCENARIO: &str = r#"
        initial_rate = "1.0"

        [pool]
        id = "demo"
        amount_cycle = "100"
        amount_collateral_in_base = "300"
        cycle_duration = 3600
        cycle_deposit_and_bid_duration = 1800
        total_cycles = 3
        start_time = "2024-01-01T00:00:00Z"

        [pool.base_token]
        symbol = "USDC"
        address = "0xbase"
        decimals = 6

        [pool.ybt]
        symbol = "sUSDS"
        address = "0xybt"
        decimals = 6

        [pool.spiral_yield_token]
        symbol = "SY"
        address = "0xsy"
        decimals = 18

        [[steps]]
        action = "join"
        owner = "0xalice"

        [[steps]]
        action = "goto"
        offset = 0

        [[steps]]
        action = "bid"
        position = 0
        amount = "250.5"

        [[steps]]
        action = "finalize"
    "#;

    #[test]
    fn scenario_loads_from_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("scenario.toml", SCENARIO)?;
            let scenario = Scenario::load("scenario.toml").map_err(|e| e.to_string())?;
            assert_eq!(scenario.clock_offset, -60);
            assert_eq!(scenario.steps.len(), 4);
            assert_eq!(
                scenario.steps[0],
                Step::Join {
                    owner: "0xalice".to_string()
                }
            );
            assert_eq!(scenario.steps[3], Step::Finalize);

            let params = scenario.pool.to_params().map_err(|e| e.to_string())?;
            assert_eq!(params.amount_cycle, 100_000_000);
            assert_eq!(params.total_positions, 3);
            assert_eq!(params.start_time, 1_704_067_200);
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() {
        Jail::expect_with(|_jail| {
            assert!(Scenario::load("nope.toml").is_err());
            Ok(())
        });
    }

    #[test]
    fn negative_offsets_clamp() {
        assert_eq!(Scenario::offset_time(100, -60), 40);
        assert_eq!(Scenario::offset_time(10, -60), 0);
        assert_eq!(Scenario::offset_time(10, 5), 15);
    }
}
