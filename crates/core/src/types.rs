//! Ledger types shared by every layer of the pool engine.
//!
//! These are plain data. Cycle timings are always derived from the pool's
//! `start_time` and durations and never stored on their own.

use crate::error::PoolError;
use crate::math::Amount;
use serde::{Deserialize, Serialize};

/// Epoch seconds supplied by the environment.
pub type Timestamp = u64;

/// Dense, 0-indexed position id assigned in join order.
pub type PositionId = u32;

/// Pool identifier (contract address or any stable key).
pub type PoolId = String;

/// Account address that owns a position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Reference to an asset the pool handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

impl AssetRef {
    #[must_use]
    pub fn new(symbol: impl Into<String>, address: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            address: Address::new(address),
            decimals,
        }
    }
}

/// Immutable pool parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    pub id: PoolId,
    pub base_token: AssetRef,
    pub ybt: AssetRef,
    pub spiral_yield_token: AssetRef,
    /// Fixed per-cycle deposit in base units.
    pub amount_cycle: Amount,
    /// Collateral value every position locks, in base units.
    pub amount_collateral_in_base: Amount,
    /// Seconds per cycle.
    pub cycle_duration: u64,
    /// Seconds the deposit-and-bid window stays open at the start of a cycle.
    pub cycle_deposit_and_bid_duration: u64,
    pub total_cycles: u32,
    pub total_positions: u32,
    pub start_time: Timestamp,
}

impl PoolParams {
    /// Checks the parameter invariants.
    ///
    /// The one-winner-per-cycle design needs `total_positions == total_cycles`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidParameters`] describing the first violation.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.total_cycles == 0 {
            return Err(PoolError::InvalidParameters(
                "total_cycles must be positive".to_string(),
            ));
        }
        if self.total_positions != self.total_cycles {
            return Err(PoolError::InvalidParameters(format!(
                "total_positions ({}) must equal total_cycles ({})",
                self.total_positions, self.total_cycles
            )));
        }
        if self.cycle_duration == 0 {
            return Err(PoolError::InvalidParameters(
                "cycle_duration must be positive".to_string(),
            ));
        }
        if self.cycle_deposit_and_bid_duration == 0
            || self.cycle_deposit_and_bid_duration > self.cycle_duration
        {
            return Err(PoolError::InvalidParameters(format!(
                "cycle_deposit_and_bid_duration ({}) must be in 1..={}",
                self.cycle_deposit_and_bid_duration, self.cycle_duration
            )));
        }
        if self.amount_cycle == 0 {
            return Err(PoolError::InvalidParameters(
                "amount_cycle must be positive".to_string(),
            ));
        }
        if self.amount_collateral_in_base == 0 {
            return Err(PoolError::InvalidParameters(
                "amount_collateral_in_base must be positive".to_string(),
            ));
        }
        self.checked_end_time().ok_or_else(|| {
            PoolError::InvalidParameters("end_time overflows u64".to_string())
        })?;
        Ok(())
    }

    fn checked_end_time(&self) -> Option<Timestamp> {
        self.cycle_duration
            .checked_mul(u64::from(self.total_cycles))
            .and_then(|span| self.start_time.checked_add(span))
    }

    /// `start_time + cycle_duration * total_cycles`.
    ///
    /// Saturates; validated params never reach the saturation point.
    #[must_use]
    pub fn end_time(&self) -> Timestamp {
        self.checked_end_time().unwrap_or(Timestamp::MAX)
    }

    /// Derives the timings of cycle `count` (1-indexed).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CycleOutOfRange`] for counts outside `1..=total_cycles`.
    pub fn cycle(&self, count: u32) -> Result<Cycle, PoolError> {
        if count == 0 || count > self.total_cycles {
            return Err(PoolError::CycleOutOfRange {
                cycle: count,
                total_cycles: self.total_cycles,
            });
        }
        let start_time = self.start_time + u64::from(count - 1) * self.cycle_duration;
        Ok(Cycle {
            count,
            start_time,
            end_time: start_time + self.cycle_duration,
            deposit_and_bid_end_time: start_time + self.cycle_deposit_and_bid_duration,
        })
    }

    /// Cycle whose window contains `now`, clamped to the last cycle.
    ///
    /// Returns 0 before the pool starts.
    #[must_use]
    pub fn current_cycle_count(&self, now: Timestamp) -> u32 {
        if now < self.start_time {
            return 0;
        }
        let elapsed = (now - self.start_time) / self.cycle_duration;
        let count = u32::try_from(elapsed.saturating_add(1)).unwrap_or(u32::MAX);
        count.min(self.total_cycles)
    }
}

/// Timings of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub count: u32,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub deposit_and_bid_end_time: Timestamp,
}

/// Top-level pool lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolState {
    Waiting,
    Live,
    Ended,
    Discarded,
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Live => write!(f, "LIVE"),
            Self::Ended => write!(f, "ENDED"),
            Self::Discarded => write!(f, "DISCARDED"),
        }
    }
}

/// Per-cycle lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CycleState {
    NotStarted,
    DepositAndBid,
    Unfinalized,
    Finalized,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::DepositAndBid => write!(f, "DepositAndBid"),
            Self::Unfinalized => write!(f, "Unfinalized"),
            Self::Finalized => write!(f, "Finalized"),
        }
    }
}

/// A bid in base units submitted during a deposit-and-bid window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub position_id: PositionId,
    pub amount: Amount,
}

/// Winning bid summary for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowestBid {
    pub position_id: PositionId,
    pub amount: Amount,
}

/// Spiral yield credited to one position by a distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldSplit {
    pub amount_base: Amount,
    pub amount_ybt: Amount,
}

impl YieldSplit {
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.amount_base == 0 && self.amount_ybt == 0
    }
}

/// Value released to remaining positions by one finalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLiquidityDelta {
    /// Base-asset share (carry released on the final cycle, dust).
    pub amount_base: Amount,
    /// YBT forfeited by winners plus undistributed YBT from earlier cycles.
    pub amount_ybt: Amount,
}

impl PoolLiquidityDelta {
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.amount_base == 0 && self.amount_ybt == 0
    }
}
