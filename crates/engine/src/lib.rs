//! Deterministic spiral pool engine.
//!
//! A fixed cohort locks yield-bearing collateral, then cycle by cycle bids in
//! a reverse auction for the pooled deposits. Non-winners keep earning
//! collateral appreciation and share what winners forfeit as spiral yield.
//!
//! The engine does no I/O and never reads the clock: every operation takes
//! `now` (and, where prices matter, the YBT rate) from its caller.

pub mod auction;
pub mod cycle;
pub mod lifecycle;
pub mod policy;
pub mod pool;
pub mod registry;
pub mod yield_distributor;

pub use auction::resolve;
pub use cycle::{CycleBook, CycleOutcome, CycleRecord};
pub use lifecycle::{compute_cycle_state, compute_state};
pub use policy::{
    slashing_policy_for, yield_policy_for, DepositWeighted, EqualSplit, FullCycleAmount,
    NoSlashing, Slash, SlashingPolicy, YieldPolicy,
};
pub use pool::{Claim, FinalizeOutcome, PoolLedger, PoolSnapshot, Redemption, SpiralPool};
pub use registry::PositionRegistry;
pub use yield_distributor::{
    accrue_collateral_yield, distribute_spiral_yield, CollateralAccrual, Distribution,
};
