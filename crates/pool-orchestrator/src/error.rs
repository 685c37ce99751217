use spiral_pool_core::{PoolError, PoolId};
use thiserror::Error;

/// Errors surfaced by pool handles and the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The engine rejected the operation.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The pool's actor has shut down and no longer accepts commands.
    #[error("pool {0} is not running")]
    ActorStopped(PoolId),

    #[error("pool {0} is already registered")]
    DuplicatePool(PoolId),

    #[error("pool {0} not found")]
    PoolNotFound(PoolId),
}

impl OrchestratorError {
    /// The engine error behind this failure, if any.
    #[must_use]
    pub const fn pool_error(&self) -> Option<&PoolError> {
        match self {
            Self::Pool(err) => Some(err),
            _ => None,
        }
    }
}
