//! The pool aggregate.
//!
//! [`SpiralPool`] composes the registry, the cycle book, the auction and the
//! yield distributor behind one serialized set of operations. Every mutating
//! operation either commits completely or leaves the pool untouched.

use crate::auction;
use crate::cycle::{CycleBook, CycleOutcome};
use crate::lifecycle::{compute_cycle_state, compute_state};
use crate::policy::{slashing_policy_for, yield_policy_for, SlashingPolicy, YieldPolicy};
use crate::registry::PositionRegistry;
use crate::yield_distributor::{accrue_collateral_yield, distribute_spiral_yield};
use serde::{Deserialize, Serialize};
use spiral_pool_core::math::checked_add;
use spiral_pool_core::{
    Address, Amount, Cycle, CycleState, EngineConfig, LowestBid, PoolError, PoolEvent,
    PoolEventKind, PoolLiquidityDelta, PoolParams, PoolState, Position, PositionId, Rate,
    SpiralYield, Timestamp,
};
use std::sync::Arc;

// ============================================================================
// Result types
// ============================================================================

/// Result of a finalize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizeOutcome {
    /// A cycle was finalized by this call.
    Finalized(Box<CycleOutcome>),
    /// The requested cycle was already finalized; nothing changed.
    AlreadyFinalized { cycle: u32 },
}

/// Amounts paid out by a claim. Zero when nothing had accrued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub position_id: PositionId,
    pub amount_base: Amount,
    pub amount_ybt: Amount,
}

impl Claim {
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.amount_base == 0 && self.amount_ybt == 0
    }
}

/// Collateral returned to a holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub position_id: PositionId,
    pub amount_ybt: Amount,
}

/// Pool-level balances and running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLedger {
    /// Base liquidity waiting for the next auction.
    pub carried_forward: Amount,
    /// YBT released to the cohort but not yet distributed.
    pub undistributed_ybt: Amount,
    pub total_collateral_ybt: Amount,
    pub total_deposited: Amount,
    pub total_paid_out: Amount,
    pub total_slashed_ybt: Amount,
    pub total_collateral_yield_accrued: Amount,
    pub total_collateral_yield_claimed: Amount,
    pub total_spiral_base_distributed: Amount,
    pub total_spiral_ybt_distributed: Amount,
    pub total_spiral_base_claimed: Amount,
    pub total_spiral_ybt_claimed: Amount,
    pub total_redeemed_ybt: Amount,
}

/// Read-only view of the committed pool state at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub params: PoolParams,
    pub taken_at: Timestamp,
    pub state: PoolState,
    pub current_cycle: Option<Cycle>,
    pub current_cycle_state: Option<CycleState>,
    pub cycles_finalized: u32,
    pub positions_filled: u32,
    pub positions: Vec<Position>,
    pub outcomes: Vec<CycleOutcome>,
    pub ledger: PoolLedger,
}

// ============================================================================
// Aggregate
// ============================================================================

/// Committed state. Cloned as a working copy by multi-step operations.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PoolBook {
    registry: PositionRegistry,
    cycles: CycleBook,
    cycles_finalized: u32,
    ledger: PoolLedger,
}

#[derive(Debug)]
pub struct SpiralPool {
    params: PoolParams,
    yield_policy: Arc<dyn YieldPolicy>,
    slashing_policy: Arc<dyn SlashingPolicy>,
    book: PoolBook,
    events: Vec<PoolEvent>,
}

impl SpiralPool {
    /// Creates an empty pool in the WAITING state.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidParameters`] if `params` fail validation.
    pub fn new(
        params: PoolParams,
        yield_policy: Arc<dyn YieldPolicy>,
        slashing_policy: Arc<dyn SlashingPolicy>,
    ) -> Result<Self, PoolError> {
        params.validate()?;
        tracing::info!(
            pool_id = %params.id,
            total_cycles = params.total_cycles,
            start_time = params.start_time,
            yield_policy = yield_policy.name(),
            slashing = slashing_policy.name(),
            "Pool created"
        );
        Ok(Self {
            book: PoolBook {
                registry: PositionRegistry::new(params.total_positions, params.total_cycles),
                cycles: CycleBook::new(params.total_cycles),
                cycles_finalized: 0,
                ledger: PoolLedger::default(),
            },
            params,
            yield_policy,
            slashing_policy,
            events: Vec::new(),
        })
    }

    /// Creates a pool with the policies selected in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidParameters`] if `params` fail validation.
    pub fn from_config(params: PoolParams, config: &EngineConfig) -> Result<Self, PoolError> {
        Self::new(
            params,
            yield_policy_for(config.yield_policy),
            slashing_policy_for(config.slashing),
        )
    }

    fn emit(&mut self, at: Timestamp, kind: PoolEventKind) {
        self.events.push(PoolEvent {
            pool_id: self.params.id.clone(),
            at,
            kind,
        });
    }

    /// Takes the events recorded by committed operations, oldest first.
    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------------
    // Joining
    // ------------------------------------------------------------------------

    /// YBT a new position must lock at `ybt_rate`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidParameters`] for a zero rate
    /// - [`PoolError::Overflow`] on conversion overflow
    pub fn required_collateral(&self, ybt_rate: Rate) -> Result<Amount, PoolError> {
        if ybt_rate.is_zero() {
            return Err(PoolError::InvalidParameters(
                "ybt rate must be non-zero".to_string(),
            ));
        }
        ybt_rate.base_to_ybt_ceil(self.params.amount_collateral_in_base)
    }

    /// Seats `owner` in the cohort, locking collateral at `ybt_rate`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidState`] unless the pool is WAITING
    /// - [`PoolError::CohortFull`] when every seat is taken
    /// - [`PoolError::AlreadyActed`] when `owner` already holds a position
    /// - [`PoolError::InvalidParameters`] for a zero rate
    pub fn join_pool(
        &mut self,
        owner: Address,
        ybt_rate: Rate,
        now: Timestamp,
    ) -> Result<PositionId, PoolError> {
        let state = self.pool_state(now);
        if state != PoolState::Waiting {
            return Err(PoolError::invalid_state(
                "join",
                format!("pool is {state}, joining requires WAITING"),
            ));
        }
        let amount_collateral = self.required_collateral(ybt_rate)?;
        let total_collateral = checked_add(
            self.book.ledger.total_collateral_ybt,
            amount_collateral,
            "total collateral",
        )?;

        let position_id =
            self.book
                .registry
                .register(owner.clone(), amount_collateral, ybt_rate)?;
        self.book.ledger.total_collateral_ybt = total_collateral;

        tracing::info!(
            pool_id = %self.params.id,
            position_id,
            owner = %owner,
            amount_collateral,
            rate = %ybt_rate,
            "Position joined"
        );
        self.emit(
            now,
            PoolEventKind::Joined {
                position_id,
                owner,
                amount_collateral,
            },
        );
        Ok(position_id)
    }

    // ------------------------------------------------------------------------
    // Deposit and bid window
    // ------------------------------------------------------------------------

    /// Returns the cycle currently accepting deposits and bids.
    fn open_cycle(&self, operation: &'static str, now: Timestamp) -> Result<u32, PoolError> {
        let state = self.pool_state(now);
        if state != PoolState::Live {
            return Err(PoolError::invalid_state(
                operation,
                format!("pool is {state}, not LIVE"),
            ));
        }
        let cycle = self.params.current_cycle_count(now);
        let finalized = self.book.cycles_finalized;
        if finalized + 1 != cycle {
            return Err(PoolError::invalid_state(
                operation,
                format!("cycle {cycle} cannot open while only {finalized} cycles are finalized"),
            ));
        }
        let cycle_state = self.cycle_state(cycle, now)?;
        if cycle_state != CycleState::DepositAndBid {
            return Err(PoolError::invalid_state(
                operation,
                format!("cycle {cycle} is {cycle_state}, not DepositAndBid"),
            ));
        }
        Ok(cycle)
    }

    fn eligible_position(&self, position_id: PositionId) -> Result<&Position, PoolError> {
        let position = self.book.registry.get(position_id)?;
        if position.winning_cycle.is_some() {
            return Err(PoolError::NotEligible {
                position_id,
                reason: "position already won a cycle",
            });
        }
        if position.redeemed {
            return Err(PoolError::NotEligible {
                position_id,
                reason: "collateral already redeemed",
            });
        }
        Ok(position)
    }

    /// Records the position's deposit for the open cycle and returns the base
    /// amount owed.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidState`] outside an open deposit-and-bid window
    /// - [`PoolError::UnknownPosition`], [`PoolError::NotEligible`]
    /// - [`PoolError::AlreadyActed`] on a second deposit in the cycle
    pub fn deposit_cycle(
        &mut self,
        position_id: PositionId,
        now: Timestamp,
    ) -> Result<Amount, PoolError> {
        let cycle = self.open_cycle("deposit", now)?;
        self.eligible_position(position_id)?;
        let amount = self.params.amount_cycle;
        let total_deposited =
            checked_add(self.book.ledger.total_deposited, amount, "total deposited")?;

        let position = self.book.registry.get_mut(position_id)?;
        position.mark_deposited(cycle)?;
        self.book.cycles.record_deposit(cycle, position_id)?;
        self.book.ledger.total_deposited = total_deposited;

        tracing::debug!(pool_id = %self.params.id, position_id, cycle, amount, "Deposit recorded");
        self.emit(
            now,
            PoolEventKind::Deposited {
                position_id,
                cycle,
                amount,
            },
        );
        Ok(amount)
    }

    /// Records a bid for the open cycle. The position must have deposited first.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidState`] outside an open deposit-and-bid window
    /// - [`PoolError::UnknownPosition`], [`PoolError::NotEligible`]
    /// - [`PoolError::AlreadyActed`] on a second bid in the cycle
    pub fn bid_cycle(
        &mut self,
        position_id: PositionId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        let cycle = self.open_cycle("bid", now)?;
        let position = self.eligible_position(position_id)?;
        if !position.has_deposited(cycle) {
            return Err(PoolError::NotEligible {
                position_id,
                reason: "bidding requires this cycle's deposit",
            });
        }
        self.book.cycles.record_bid(cycle, position_id, amount)?;

        tracing::debug!(pool_id = %self.params.id, position_id, cycle, amount, "Bid recorded");
        self.emit(
            now,
            PoolEventKind::BidPlaced {
                position_id,
                cycle,
                amount,
            },
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Finalization
    // ------------------------------------------------------------------------

    /// Finalizes the next unfinalized cycle.
    ///
    /// Returns [`FinalizeOutcome::AlreadyFinalized`] once every cycle is done.
    ///
    /// # Errors
    ///
    /// See [`SpiralPool::finalize_cycle_at`].
    pub fn finalize_cycle(
        &mut self,
        now: Timestamp,
        ybt_rate: Rate,
    ) -> Result<FinalizeOutcome, PoolError> {
        if self.book.cycles_finalized >= self.params.total_cycles {
            return Ok(FinalizeOutcome::AlreadyFinalized {
                cycle: self.params.total_cycles,
            });
        }
        self.finalize_cycle_at(self.book.cycles_finalized + 1, now, ybt_rate)
    }

    /// Finalizes `cycle`. Finalizing an already finalized cycle is a no-op.
    ///
    /// # Errors
    ///
    /// - [`PoolError::CycleOutOfRange`] for an unknown cycle
    /// - [`PoolError::InvalidState`] if an earlier cycle is unfinalized, the
    ///   pool is not LIVE or ENDED, or the cycle's window is still open
    /// - [`PoolError::InvalidParameters`] for a zero rate
    /// - [`PoolError::InvariantViolation`] if the yield policy misbehaves
    pub fn finalize_cycle_at(
        &mut self,
        cycle: u32,
        now: Timestamp,
        ybt_rate: Rate,
    ) -> Result<FinalizeOutcome, PoolError> {
        self.params.cycle(cycle)?;
        if cycle <= self.book.cycles_finalized {
            return Ok(FinalizeOutcome::AlreadyFinalized { cycle });
        }
        if cycle != self.book.cycles_finalized + 1 {
            return Err(PoolError::invalid_state(
                "finalize",
                format!(
                    "cycle {} must be finalized before cycle {cycle}",
                    self.book.cycles_finalized + 1
                ),
            ));
        }
        let state = self.pool_state(now);
        if !matches!(state, PoolState::Live | PoolState::Ended) {
            return Err(PoolError::invalid_state(
                "finalize",
                format!("pool is {state}"),
            ));
        }
        let cycle_state = self.cycle_state(cycle, now)?;
        if cycle_state != CycleState::Unfinalized {
            return Err(PoolError::invalid_state(
                "finalize",
                format!("cycle {cycle} is {cycle_state}"),
            ));
        }
        if ybt_rate.is_zero() {
            return Err(PoolError::InvalidParameters(
                "ybt rate must be non-zero".to_string(),
            ));
        }

        let mut book = self.book.clone();
        let outcome = self.settle_cycle(&mut book, cycle, now, ybt_rate)?;
        self.book = book;

        tracing::info!(
            pool_id = %self.params.id,
            cycle,
            winner = ?outcome.winner.map(|w| w.position_id),
            liquidity = outcome.liquidity,
            payout = outcome.payout,
            carried_forward = outcome.carried_forward,
            "Cycle finalized"
        );
        self.emit(
            now,
            PoolEventKind::CycleFinalized {
                cycle,
                winner: outcome.winner,
                payout: outcome.payout,
                carried_forward: outcome.carried_forward,
            },
        );
        Ok(FinalizeOutcome::Finalized(Box::new(outcome)))
    }

    /// Whether deposits for `cycle` were ever accepted: cycle 1 always, later
    /// cycles only if their predecessor was finalized before the window closed.
    fn window_opened(&self, book: &PoolBook, cycle: u32) -> Result<bool, PoolError> {
        if cycle <= 1 {
            return Ok(true);
        }
        let closes_at = self.params.cycle(cycle)?.deposit_and_bid_end_time;
        Ok(book
            .cycles
            .record(cycle - 1)?
            .outcome
            .as_ref()
            .is_some_and(|previous| previous.finalized_at < closes_at))
    }

    /// Runs every finalization step against `book`.
    fn settle_cycle(
        &self,
        book: &mut PoolBook,
        cycle: u32,
        now: Timestamp,
        rate: Rate,
    ) -> Result<CycleOutcome, PoolError> {
        let record = book.cycles.record(cycle)?.clone();
        let amount_cycle = self.params.amount_cycle;
        let is_last = cycle == self.params.total_cycles;

        // Slash active positions that skipped a window they could reach.
        let window_opened = self.window_opened(book, cycle)?;
        let missed: Vec<PositionId> = if window_opened {
            book.registry
                .active()
                .filter(|p| !p.has_deposited(cycle))
                .map(|p| p.id)
                .collect()
        } else {
            Vec::new()
        };
        let mut slashed_base: Amount = 0;
        let mut slashed_ybt: Amount = 0;
        for position_id in missed {
            let position = book.registry.get_mut(position_id)?;
            let slash = self.slashing_policy.slash(position, amount_cycle, rate)?;
            if slash.amount_ybt == 0 && slash.amount_base == 0 {
                continue;
            }
            position.collateral_slashed =
                checked_add(position.collateral_slashed, slash.amount_ybt, "collateral slashed")?;
            slashed_ybt = checked_add(slashed_ybt, slash.amount_ybt, "slashed ybt")?;
            slashed_base = checked_add(slashed_base, slash.amount_base, "slashed base")?;
            tracing::debug!(
                pool_id = %self.params.id,
                position_id,
                cycle,
                amount_ybt = slash.amount_ybt,
                "Missed deposit slashed"
            );
        }

        let depositors = u32::try_from(record.depositors.len())
            .map_err(|_| PoolError::Overflow { operation: "depositor count" })?;
        let deposits = amount_cycle
            .checked_mul(u128::from(depositors))
            .ok_or(PoolError::Overflow { operation: "cycle deposits" })?;
        let carried_in = book.ledger.carried_forward;
        let liquidity = checked_add(
            checked_add(deposits, slashed_base, "cycle liquidity")?,
            carried_in,
            "cycle liquidity",
        )?;

        let winner = auction::resolve(&record.bids());
        let (payout, released_carry, carried_forward) = match winner {
            Some(lowest) => {
                let position = book.registry.get_mut(lowest.position_id)?;
                if !position.is_active() {
                    return Err(PoolError::invariant(format!(
                        "winning bid from inactive position {}",
                        lowest.position_id
                    )));
                }
                position.assign_win(cycle)?;
                (liquidity, 0, 0)
            }
            None if is_last => (0, liquidity, 0),
            None => (0, 0, liquidity),
        };

        let accrual = accrue_collateral_yield(&mut book.registry, &self.params, rate)?;

        let yield_delta = PoolLiquidityDelta {
            amount_base: released_carry,
            amount_ybt: checked_add(
                accrual.forfeited,
                book.ledger.undistributed_ybt,
                "spiral ybt delta",
            )?,
        };
        let distribution =
            distribute_spiral_yield(self.yield_policy.as_ref(), &mut book.registry, yield_delta)?;

        let carried_forward =
            checked_add(carried_forward, distribution.dust.amount_base, "carried forward")?;

        let ledger = &mut book.ledger;
        ledger.carried_forward = carried_forward;
        ledger.undistributed_ybt = distribution.dust.amount_ybt;
        ledger.total_paid_out = checked_add(ledger.total_paid_out, payout, "total paid out")?;
        ledger.total_slashed_ybt =
            checked_add(ledger.total_slashed_ybt, slashed_ybt, "total slashed")?;
        ledger.total_collateral_yield_accrued = checked_add(
            ledger.total_collateral_yield_accrued,
            accrual.accrued,
            "total collateral yield",
        )?;
        ledger.total_spiral_base_distributed = checked_add(
            ledger.total_spiral_base_distributed,
            distribution.distributed.amount_base,
            "total spiral base",
        )?;
        ledger.total_spiral_ybt_distributed = checked_add(
            ledger.total_spiral_ybt_distributed,
            distribution.distributed.amount_ybt,
            "total spiral ybt",
        )?;

        let outcome = CycleOutcome {
            cycle,
            finalized_at: now,
            ybt_rate: rate,
            winner,
            depositors,
            liquidity,
            slashed_base,
            slashed_ybt,
            payout,
            window_opened,
            released_carry,
            carried_forward,
            collateral_yield_accrued: accrual.accrued,
            yield_delta,
            distributed: distribution.splits,
        };
        book.cycles.record_outcome(outcome.clone())?;

        if book.cycles_finalized + 1 != cycle {
            return Err(PoolError::invariant(format!(
                "finalizing cycle {cycle} with {} cycles finalized",
                book.cycles_finalized
            )));
        }
        book.cycles_finalized = cycle;
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Claims and redemption
    // ------------------------------------------------------------------------

    fn require_claimable(&self, operation: &'static str, now: Timestamp) -> Result<(), PoolError> {
        let state = self.pool_state(now);
        if matches!(state, PoolState::Live | PoolState::Ended) {
            Ok(())
        } else {
            Err(PoolError::invalid_state(
                operation,
                format!("pool is {state}, claims require LIVE or ENDED"),
            ))
        }
    }

    /// Pays out and zeroes the position's collateral yield (YBT).
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidState`] unless the pool is LIVE or ENDED
    /// - [`PoolError::UnknownPosition`]
    pub fn claim_collateral_yield(
        &mut self,
        position_id: PositionId,
        now: Timestamp,
    ) -> Result<Claim, PoolError> {
        self.require_claimable("claim collateral yield", now)?;
        let amount_ybt = self.book.registry.get(position_id)?.collateral_yield;
        let claim = Claim {
            position_id,
            amount_base: 0,
            amount_ybt,
        };
        if claim.is_zero() {
            return Ok(claim);
        }
        let claimed = checked_add(
            self.book.ledger.total_collateral_yield_claimed,
            amount_ybt,
            "collateral yield claimed",
        )?;
        self.book.registry.get_mut(position_id)?.collateral_yield = 0;
        self.book.ledger.total_collateral_yield_claimed = claimed;

        tracing::info!(pool_id = %self.params.id, position_id, amount_ybt, "Collateral yield claimed");
        self.emit(
            now,
            PoolEventKind::CollateralYieldClaimed {
                position_id,
                amount_ybt,
            },
        );
        Ok(claim)
    }

    /// Pays out and zeroes the position's spiral yield.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidState`] unless the pool is LIVE or ENDED
    /// - [`PoolError::UnknownPosition`]
    pub fn claim_spiral_yield(
        &mut self,
        position_id: PositionId,
        now: Timestamp,
    ) -> Result<Claim, PoolError> {
        self.require_claimable("claim spiral yield", now)?;
        let accrued = self.book.registry.get(position_id)?.spiral_yield;
        let claim = Claim {
            position_id,
            amount_base: accrued.amount_base,
            amount_ybt: accrued.amount_ybt,
        };
        if claim.is_zero() {
            return Ok(claim);
        }
        let base_claimed = checked_add(
            self.book.ledger.total_spiral_base_claimed,
            claim.amount_base,
            "spiral base claimed",
        )?;
        let ybt_claimed = checked_add(
            self.book.ledger.total_spiral_ybt_claimed,
            claim.amount_ybt,
            "spiral ybt claimed",
        )?;
        self.book.registry.get_mut(position_id)?.spiral_yield = SpiralYield::default();
        self.book.ledger.total_spiral_base_claimed = base_claimed;
        self.book.ledger.total_spiral_ybt_claimed = ybt_claimed;

        tracing::info!(
            pool_id = %self.params.id,
            position_id,
            amount_base = claim.amount_base,
            amount_ybt = claim.amount_ybt,
            "Spiral yield claimed"
        );
        self.emit(
            now,
            PoolEventKind::SpiralYieldClaimed {
                position_id,
                amount_base: claim.amount_base,
                amount_ybt: claim.amount_ybt,
            },
        );
        Ok(claim)
    }

    fn redeem(
        &mut self,
        position_id: PositionId,
        amount_ybt: Amount,
        now: Timestamp,
    ) -> Result<Redemption, PoolError> {
        let total = checked_add(
            self.book.ledger.total_redeemed_ybt,
            amount_ybt,
            "total redeemed",
        )?;
        self.book.registry.get_mut(position_id)?.redeemed = true;
        self.book.ledger.total_redeemed_ybt = total;

        tracing::info!(pool_id = %self.params.id, position_id, amount_ybt, "Collateral redeemed");
        self.emit(
            now,
            PoolEventKind::CollateralRedeemed {
                position_id,
                amount_ybt,
            },
        );
        Ok(Redemption {
            position_id,
            amount_ybt,
        })
    }

    /// Returns the full collateral of a position in a discarded pool. Once per position.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidState`] unless the pool is DISCARDED
    /// - [`PoolError::UnknownPosition`]
    /// - [`PoolError::AlreadyRedeemed`] on a second call
    pub fn redeem_collateral_if_discarded(
        &mut self,
        position_id: PositionId,
        now: Timestamp,
    ) -> Result<Redemption, PoolError> {
        let state = self.pool_state(now);
        if state != PoolState::Discarded {
            return Err(PoolError::invalid_state(
                "redeem",
                format!("pool is {state}, redemption requires DISCARDED"),
            ));
        }
        let position = self.book.registry.get(position_id)?;
        if position.redeemed {
            return Err(PoolError::AlreadyRedeemed { position_id });
        }
        let amount = position.amount_collateral;
        self.redeem(position_id, amount, now)
    }

    /// Returns the remaining principal once the pool has ended and every cycle
    /// is finalized.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidState`] unless the pool is ENDED and fully finalized
    /// - [`PoolError::UnknownPosition`]
    /// - [`PoolError::AlreadyRedeemed`] on a second call
    pub fn withdraw_collateral(
        &mut self,
        position_id: PositionId,
        now: Timestamp,
    ) -> Result<Redemption, PoolError> {
        let state = self.pool_state(now);
        if state != PoolState::Ended {
            return Err(PoolError::invalid_state(
                "withdraw",
                format!("pool is {state}, withdrawal requires ENDED"),
            ));
        }
        if self.book.cycles_finalized < self.params.total_cycles {
            return Err(PoolError::invalid_state(
                "withdraw",
                format!(
                    "{} of {} cycles finalized",
                    self.book.cycles_finalized, self.params.total_cycles
                ),
            ));
        }
        let position = self.book.registry.get(position_id)?;
        if position.redeemed {
            return Err(PoolError::AlreadyRedeemed { position_id });
        }
        let amount = position.remaining_principal();
        self.redeem(position_id, amount, now)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    #[must_use]
    pub const fn params(&self) -> &PoolParams {
        &self.params
    }

    #[must_use]
    pub fn pool_state(&self, now: Timestamp) -> PoolState {
        compute_state(
            self.params.start_time,
            self.params.end_time(),
            self.params.total_positions,
            self.book.registry.filled(),
            now,
        )
    }

    /// # Errors
    ///
    /// Returns [`PoolError::CycleOutOfRange`] for an unknown cycle.
    pub fn cycle_state(&self, cycle: u32, now: Timestamp) -> Result<CycleState, PoolError> {
        compute_cycle_state(
            &self.params,
            cycle,
            self.pool_state(now),
            self.book.cycles_finalized,
            now,
        )
    }

    /// Cycle whose window contains `now`; `None` before the start.
    #[must_use]
    pub fn current_cycle(&self, now: Timestamp) -> Option<Cycle> {
        match self.params.current_cycle_count(now) {
            0 => None,
            count => self.params.cycle(count).ok(),
        }
    }

    /// Every cycle's timings in order.
    #[must_use]
    pub fn schedule(&self) -> Vec<Cycle> {
        (1..=self.params.total_cycles)
            .filter_map(|count| self.params.cycle(count).ok())
            .collect()
    }

    #[must_use]
    pub const fn cycles_finalized(&self) -> u32 {
        self.book.cycles_finalized
    }

    #[must_use]
    pub fn positions_filled(&self) -> u32 {
        self.book.registry.filled()
    }

    #[must_use]
    pub fn all_positions(&self) -> &[Position] {
        self.book.registry.all()
    }

    /// # Errors
    ///
    /// Returns [`PoolError::UnknownPosition`].
    pub fn position(&self, position_id: PositionId) -> Result<&Position, PoolError> {
        self.book.registry.get(position_id)
    }

    /// Winner of a finalized cycle, or the current leader of an open one.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CycleOutOfRange`] for an unknown cycle.
    pub fn lowest_bid(&self, cycle: u32) -> Result<Option<LowestBid>, PoolError> {
        Ok(self.book.cycles.record(cycle)?.lowest_bid())
    }

    /// Claimable collateral yield in YBT.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::UnknownPosition`].
    pub fn collateral_yield(&self, position_id: PositionId) -> Result<Amount, PoolError> {
        Ok(self.book.registry.get(position_id)?.collateral_yield)
    }

    /// # Errors
    ///
    /// Returns [`PoolError::UnknownPosition`].
    pub fn spiral_yield(&self, position_id: PositionId) -> Result<SpiralYield, PoolError> {
        Ok(self.book.registry.get(position_id)?.spiral_yield)
    }

    /// # Errors
    ///
    /// Returns [`PoolError::CycleOutOfRange`] for an unknown cycle.
    pub fn cycle_outcome(&self, cycle: u32) -> Result<Option<&CycleOutcome>, PoolError> {
        Ok(self.book.cycles.record(cycle)?.outcome.as_ref())
    }

    #[must_use]
    pub const fn ledger(&self) -> &PoolLedger {
        &self.book.ledger
    }

    #[must_use]
    pub fn snapshot(&self, now: Timestamp) -> PoolSnapshot {
        let current_cycle = self.current_cycle(now);
        PoolSnapshot {
            params: self.params.clone(),
            taken_at: now,
            state: self.pool_state(now),
            current_cycle_state: current_cycle.and_then(|c| self.cycle_state(c.count, now).ok()),
            current_cycle,
            cycles_finalized: self.book.cycles_finalized,
            positions_filled: self.positions_filled(),
            positions: self.book.registry.all().to_vec(),
            outcomes: self.book.cycles.outcomes().cloned().collect(),
            ledger: self.book.ledger,
        }
    }
}
