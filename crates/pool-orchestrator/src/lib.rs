//! One actor per pool.
//!
//! Each [`PoolActor`] is the single writer for its [`SpiralPool`]
//! (`spiral_pool_engine`), fed through an mpsc queue. Handles read committed
//! state from a `watch` snapshot and follow domain events on a `broadcast`
//! channel. Distinct pools never share a lock.
//!
//! [`SpiralPool`]: spiral_pool_engine::SpiralPool

pub mod actor;
pub mod commands;
pub mod error;
pub mod handle;
pub mod registry;

pub use actor::PoolActor;
pub use commands::PoolCommand;
pub use error::OrchestratorError;
pub use handle::PoolHandle;
pub use registry::PoolRegistry;
