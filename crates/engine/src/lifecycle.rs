//! Pure state derivation for pools and cycles.
//!
//! Nothing here reads a clock. Callers pass `now` in, so the same inputs
//! always give the same state.

use spiral_pool_core::{CycleState, PoolError, PoolParams, PoolState, Timestamp};

/// Derives the pool state from its schedule and fill level.
///
/// A pool that is not full by `start_time` is discarded for good, even after
/// `end_time`.
#[must_use]
pub const fn compute_state(
    start_time: Timestamp,
    end_time: Timestamp,
    total_positions: u32,
    positions_filled: u32,
    now: Timestamp,
) -> PoolState {
    if now < start_time {
        PoolState::Waiting
    } else if positions_filled < total_positions {
        PoolState::Discarded
    } else if now >= end_time {
        PoolState::Ended
    } else {
        PoolState::Live
    }
}

/// Derives the state of cycle `count`.
///
/// A cycle whose predecessor is still unfinalized stays `NotStarted` until its
/// window would have closed: deposits and bids are not accepted for it, and
/// once the window has passed it can only be finalized.
///
/// # Errors
///
/// Returns [`PoolError::CycleOutOfRange`] for counts outside `1..=total_cycles`.
pub fn compute_cycle_state(
    params: &PoolParams,
    count: u32,
    pool_state: PoolState,
    cycles_finalized: u32,
    now: Timestamp,
) -> Result<CycleState, PoolError> {
    let cycle = params.cycle(count)?;

    if count <= cycles_finalized {
        return Ok(CycleState::Finalized);
    }
    if matches!(pool_state, PoolState::Waiting | PoolState::Discarded) || now < cycle.start_time
    {
        return Ok(CycleState::NotStarted);
    }
    if now < cycle.deposit_and_bid_end_time {
        if count > cycles_finalized + 1 {
            return Ok(CycleState::NotStarted);
        }
        return Ok(CycleState::DepositAndBid);
    }
    Ok(CycleState::Unfinalized)
}
