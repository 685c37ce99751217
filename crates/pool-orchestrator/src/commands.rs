use spiral_pool_core::{Address, Amount, CycleState, LowestBid, PoolError, PositionId, Rate};
use spiral_pool_engine::{Claim, FinalizeOutcome, PoolSnapshot, Redemption};
use tokio::sync::oneshot;

/// Reply channel for a command.
pub type Reply<T> = oneshot::Sender<Result<T, PoolError>>;

/// Commands processed one at a time by a [`PoolActor`](crate::PoolActor).
#[derive(Debug)]
pub enum PoolCommand {
    Join {
        owner: Address,
        reply: Reply<PositionId>,
    },
    Deposit {
        position_id: PositionId,
        reply: Reply<Amount>,
    },
    Bid {
        position_id: PositionId,
        amount: Amount,
        reply: Reply<()>,
    },
    /// Finalize the next cycle.
    Finalize {
        reply: Reply<FinalizeOutcome>,
    },
    FinalizeAt {
        cycle: u32,
        reply: Reply<FinalizeOutcome>,
    },
    ClaimCollateralYield {
        position_id: PositionId,
        reply: Reply<Claim>,
    },
    ClaimSpiralYield {
        position_id: PositionId,
        reply: Reply<Claim>,
    },
    RedeemIfDiscarded {
        position_id: PositionId,
        reply: Reply<Redemption>,
    },
    WithdrawCollateral {
        position_id: PositionId,
        reply: Reply<Redemption>,
    },
    LowestBid {
        cycle: u32,
        reply: Reply<Option<LowestBid>>,
    },
    CycleState {
        cycle: u32,
        reply: Reply<CycleState>,
    },
    RequiredCollateral {
        reply: Reply<(Rate, Amount)>,
    },
    /// Republish and return the snapshot so time-driven transitions become visible.
    Refresh {
        reply: oneshot::Sender<PoolSnapshot>,
    },
    Shutdown,
}
