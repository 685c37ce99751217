use crate::error::PoolError;
use crate::math::{checked_add, Amount, Rate};
use crate::types::{Address, PositionId, YieldSplit};
use serde::{Deserialize, Serialize};

/// Spiral yield accrued by a position and not yet claimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiralYield {
    pub amount_base: Amount,
    pub amount_ybt: Amount,
}

impl SpiralYield {
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.amount_base == 0 && self.amount_ybt == 0
    }

    /// Adds a distribution split.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] if either leg overflows.
    pub fn accrue(&mut self, split: &YieldSplit) -> Result<(), PoolError> {
        self.amount_base = checked_add(self.amount_base, split.amount_base, "spiral yield base")?;
        self.amount_ybt = checked_add(self.amount_ybt, split.amount_ybt, "spiral yield ybt")?;
        Ok(())
    }
}

/// A participant's seat in the cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub owner: Address,
    /// YBT locked at join time. Never changes afterwards.
    pub amount_collateral: Amount,
    /// YBT exchange rate observed at join.
    pub join_rate: Rate,
    /// One flag per cycle; a flag is only ever set, never cleared.
    pub cycles_deposited: Vec<bool>,
    /// 1-indexed cycle this position won, written at most once.
    pub winning_cycle: Option<u32>,
    pub spiral_yield: SpiralYield,
    /// Claimable collateral appreciation, in YBT.
    pub collateral_yield: Amount,
    /// YBT taken from the collateral for missed deposits.
    pub collateral_slashed: Amount,
    /// Cumulative YBT appreciation already credited (to this position or,
    /// after a win, forfeited to the cohort).
    pub appreciation_accounted: Amount,
    /// Collateral has been returned (discarded pool or end-of-pool withdrawal).
    pub redeemed: bool,
}

impl Position {
    #[must_use]
    pub fn new(
        id: PositionId,
        owner: Address,
        amount_collateral: Amount,
        join_rate: Rate,
        total_cycles: u32,
    ) -> Self {
        Self {
            id,
            owner,
            amount_collateral,
            join_rate,
            cycles_deposited: vec![false; total_cycles as usize],
            winning_cycle: None,
            spiral_yield: SpiralYield::default(),
            collateral_yield: 0,
            collateral_slashed: 0,
            appreciation_accounted: 0,
            redeemed: false,
        }
    }

    /// Still competing: has not won and has not been redeemed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.winning_cycle.is_none() && !self.redeemed
    }

    #[must_use]
    pub fn has_deposited(&self, cycle: u32) -> bool {
        cycle
            .checked_sub(1)
            .and_then(|index| self.cycles_deposited.get(index as usize))
            .copied()
            .unwrap_or(false)
    }

    #[must_use]
    pub fn deposit_count(&self) -> u32 {
        let count = self.cycles_deposited.iter().filter(|d| **d).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Marks the deposit for `cycle`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::AlreadyActed`] if the flag is already set
    /// - [`PoolError::InvariantViolation`] if the cycle has no slot
    pub fn mark_deposited(&mut self, cycle: u32) -> Result<(), PoolError> {
        let id = self.id;
        let slot = cycle
            .checked_sub(1)
            .and_then(|index| self.cycles_deposited.get_mut(index as usize))
            .ok_or_else(|| {
                PoolError::invariant(format!("position {id} has no deposit slot for cycle {cycle}"))
            })?;
        if *slot {
            return Err(PoolError::already_acted(
                "deposit",
                format!("position {id} already deposited in cycle {cycle}"),
            ));
        }
        *slot = true;
        Ok(())
    }

    /// Records the win. Write-once.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvariantViolation`] if a winning cycle is already set.
    pub fn assign_win(&mut self, cycle: u32) -> Result<(), PoolError> {
        if let Some(existing) = self.winning_cycle {
            return Err(PoolError::invariant(format!(
                "position {} already won cycle {existing}, refusing to overwrite with {cycle}",
                self.id
            )));
        }
        self.winning_cycle = Some(cycle);
        Ok(())
    }

    /// Collateral still owed back to the holder at the end of the pool.
    #[must_use]
    pub const fn remaining_principal(&self) -> Amount {
        self.amount_collateral
            .saturating_sub(self.collateral_slashed)
            .saturating_sub(self.appreciation_accounted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position::new(0, Address::from("0xalice"), 1_000, Rate::ONE, 3)
    }

    #[test]
    fn new_position_is_active_with_no_deposits() {
        let pos = position();
        assert!(pos.is_active());
        assert_eq!(pos.cycles_deposited, vec![false, false, false]);
        assert_eq!(pos.deposit_count(), 0);
    }

    #[test]
    fn deposit_flag_is_set_once() {
        let mut pos = position();
        pos.mark_deposited(2).unwrap();
        assert!(pos.has_deposited(2));
        assert!(!pos.has_deposited(1));
        assert!(matches!(
            pos.mark_deposited(2),
            Err(PoolError::AlreadyActed { .. })
        ));
    }

    #[test]
    fn deposit_outside_cycle_range_is_invariant_violation() {
        let mut pos = position();
        assert!(matches!(
            pos.mark_deposited(0),
            Err(PoolError::InvariantViolation(_))
        ));
        assert!(matches!(
            pos.mark_deposited(4),
            Err(PoolError::InvariantViolation(_))
        ));
    }

    #[test]
    fn winning_cycle_is_write_once() {
        let mut pos = position();
        pos.assign_win(1).unwrap();
        assert!(!pos.is_active());
        assert!(matches!(
            pos.assign_win(2),
            Err(PoolError::InvariantViolation(_))
        ));
        assert_eq!(pos.winning_cycle, Some(1));
    }

    #[test]
    fn remaining_principal_excludes_slash_and_appreciation() {
        let mut pos = position();
        pos.collateral_slashed = 100;
        pos.appreciation_accounted = 50;
        assert_eq!(pos.remaining_principal(), 850);
    }

    #[test]
    fn spiral_yield_accrues_both_legs() {
        let mut spiral = SpiralYield::default();
        spiral
            .accrue(&YieldSplit {
                amount_base: 5,
                amount_ybt: 7,
            })
            .unwrap();
        assert_eq!(spiral.amount_base, 5);
        assert_eq!(spiral.amount_ybt, 7);
    }
}
