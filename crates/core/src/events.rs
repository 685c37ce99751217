use crate::math::Amount;
use crate::types::{Address, LowestBid, PoolId, PoolState, PositionId, Timestamp};
use serde::{Deserialize, Serialize};

/// Domain event emitted after an operation commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEvent {
    pub pool_id: PoolId,
    pub at: Timestamp,
    pub kind: PoolEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolEventKind {
    /// A new position took a seat in the cohort.
    Joined {
        position_id: PositionId,
        owner: Address,
        amount_collateral: Amount,
    },

    /// Cycle deposit recorded.
    Deposited {
        position_id: PositionId,
        cycle: u32,
        amount: Amount,
    },

    /// Bid recorded for the open cycle.
    BidPlaced {
        position_id: PositionId,
        cycle: u32,
        amount: Amount,
    },

    /// A cycle was finalized.
    CycleFinalized {
        cycle: u32,
        winner: Option<LowestBid>,
        payout: Amount,
        carried_forward: Amount,
    },

    /// Collateral yield paid out (YBT).
    CollateralYieldClaimed {
        position_id: PositionId,
        amount_ybt: Amount,
    },

    /// Spiral yield paid out.
    SpiralYieldClaimed {
        position_id: PositionId,
        amount_base: Amount,
        amount_ybt: Amount,
    },

    /// Collateral returned to the holder.
    CollateralRedeemed {
        position_id: PositionId,
        amount_ybt: Amount,
    },

    /// Pool lifecycle moved between states.
    StateChanged { from: PoolState, to: PoolState },
}
