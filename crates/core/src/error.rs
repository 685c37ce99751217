//! Error types for the spiral pool engine.
//!
//! Every rejected operation surfaces as a typed [`PoolError`]. The engine
//! never retries and never silently corrects an inconsistency.

use crate::types::PositionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by pool operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The operation is not allowed in the current pool or cycle state.
    #[error("invalid state for {operation}: {reason}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// Why the current state forbids it.
        reason: String,
    },

    /// A once-only action was attempted a second time.
    #[error("already acted: {operation} ({detail})")]
    AlreadyActed {
        /// Operation that was repeated.
        operation: &'static str,
        /// Which actor and cycle repeated it.
        detail: String,
    },

    /// The cohort has already reached its fixed size.
    #[error("cohort full: all {total_positions} positions are taken")]
    CohortFull {
        /// Fixed cohort size of the pool.
        total_positions: u32,
    },

    /// Internal inconsistency, fatal to the operation.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The position is excluded from the action (it already won or redeemed).
    #[error("position {position_id} not eligible: {reason}")]
    NotEligible {
        /// Position that attempted the action.
        position_id: PositionId,
        /// Why it is excluded.
        reason: &'static str,
    },

    /// The position's collateral was already returned.
    #[error("position {position_id} already redeemed")]
    AlreadyRedeemed {
        /// Position that attempted a second redemption.
        position_id: PositionId,
    },

    /// No position with this id exists in the pool.
    #[error("unknown position {position_id}")]
    UnknownPosition {
        /// The id that was looked up.
        position_id: PositionId,
    },

    /// Cycle count outside `1..=total_cycles`.
    #[error("cycle {cycle} out of range (pool has {total_cycles} cycles)")]
    CycleOutOfRange {
        /// Requested cycle.
        cycle: u32,
        /// Number of cycles in the pool.
        total_cycles: u32,
    },

    /// Pool parameters or inputs are malformed.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Fixed-point arithmetic overflowed.
    #[error("arithmetic overflow in {operation}")]
    Overflow {
        /// Accounting step that overflowed.
        operation: &'static str,
    },
}

/// Coarse classification of a [`PoolError`] for callers that only branch on
/// the class of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidState,
    AlreadyActed,
    CohortFull,
    InvariantViolation,
    NotEligible,
    AlreadyRedeemed,
    UnknownPosition,
    CycleOutOfRange,
    InvalidParameters,
    Overflow,
}

impl PoolError {
    /// Creates an invalid-state error.
    pub fn invalid_state(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            operation,
            reason: reason.into(),
        }
    }

    /// Creates an already-acted error.
    pub fn already_acted(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::AlreadyActed {
            operation,
            detail: detail.into(),
        }
    }

    /// Creates an invariant-violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Returns the class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::AlreadyActed { .. } => ErrorKind::AlreadyActed,
            Self::CohortFull { .. } => ErrorKind::CohortFull,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::NotEligible { .. } => ErrorKind::NotEligible,
            Self::AlreadyRedeemed { .. } => ErrorKind::AlreadyRedeemed,
            Self::UnknownPosition { .. } => ErrorKind::UnknownPosition,
            Self::CycleOutOfRange { .. } => ErrorKind::CycleOutOfRange,
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::Overflow { .. } => ErrorKind::Overflow,
        }
    }
}
