//! Core ledger types, fixed-point math, errors and configuration shared by
//! the spiral pool engine, its orchestrator and the CLI.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod math;
pub mod position;
pub mod traits;
pub mod types;

pub use config::{AppConfig, EngineConfig, OrchestratorConfig, SlashingKind, YieldPolicyKind};
pub use config_loader::ConfigLoader;
pub use error::{ErrorKind, PoolError};
pub use events::{PoolEvent, PoolEventKind};
pub use math::{Amount, Rate, WAD};
pub use position::{Position, SpiralYield};
pub use traits::{Clock, ManualClock, ManualRate, RateSource};
pub use types::{
    Address, AssetRef, Bid, Cycle, CycleState, LowestBid, PoolId, PoolLiquidityDelta, PoolParams,
    PoolState, PositionId, Timestamp, YieldSplit,
};
