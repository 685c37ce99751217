//! Per-cycle book of deposits, bids and finalization outcomes.

use serde::{Deserialize, Serialize};
use spiral_pool_core::{
    Amount, Bid, LowestBid, PoolError, PoolLiquidityDelta, PositionId, Rate, Timestamp,
    YieldSplit,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::auction;

/// What a finalization decided for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub cycle: u32,
    pub finalized_at: Timestamp,
    pub ybt_rate: Rate,
    pub winner: Option<LowestBid>,
    pub depositors: u32,
    /// Base available to the auction: deposits, slashes and carry-in.
    pub liquidity: Amount,
    pub slashed_base: Amount,
    pub slashed_ybt: Amount,
    /// Base paid to the winner: the whole liquidity, or zero without a winner.
    pub payout: Amount,
    /// Whether the cycle's deposit window was reachable. Missed deposits are
    /// only slashed when it was.
    pub window_opened: bool,
    /// Carry released to the cohort on the final cycle when nobody won.
    pub released_carry: Amount,
    /// Base carried into the next cycle after this one.
    pub carried_forward: Amount,
    /// Collateral yield credited to active positions (YBT).
    pub collateral_yield_accrued: Amount,
    /// Value offered to the yield policy.
    pub yield_delta: PoolLiquidityDelta,
    pub distributed: BTreeMap<PositionId, YieldSplit>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub count: u32,
    pub depositors: BTreeSet<PositionId>,
    pub bids: BTreeMap<PositionId, Amount>,
    pub outcome: Option<CycleOutcome>,
}

impl CycleRecord {
    #[must_use]
    pub fn bids(&self) -> Vec<Bid> {
        self.bids
            .iter()
            .map(|(&position_id, &amount)| Bid {
                position_id,
                amount,
            })
            .collect()
    }

    /// Recorded winner once finalized, otherwise the current leader.
    #[must_use]
    pub fn lowest_bid(&self) -> Option<LowestBid> {
        match &self.outcome {
            Some(outcome) => outcome.winner,
            None => auction::resolve(&self.bids()),
        }
    }

    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.outcome.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleBook {
    records: Vec<CycleRecord>,
}

impl CycleBook {
    #[must_use]
    pub fn new(total_cycles: u32) -> Self {
        Self {
            records: (1..=total_cycles)
                .map(|count| CycleRecord {
                    count,
                    ..CycleRecord::default()
                })
                .collect(),
        }
    }

    fn total_cycles(&self) -> u32 {
        u32::try_from(self.records.len()).unwrap_or(u32::MAX)
    }

    fn out_of_range(&self, cycle: u32) -> PoolError {
        PoolError::CycleOutOfRange {
            cycle,
            total_cycles: self.total_cycles(),
        }
    }

    /// # Errors
    ///
    /// Returns [`PoolError::CycleOutOfRange`] for counts outside `1..=total_cycles`.
    pub fn record(&self, cycle: u32) -> Result<&CycleRecord, PoolError> {
        cycle
            .checked_sub(1)
            .and_then(|index| self.records.get(index as usize))
            .ok_or_else(|| self.out_of_range(cycle))
    }

    fn record_mut(&mut self, cycle: u32) -> Result<&mut CycleRecord, PoolError> {
        let err = self.out_of_range(cycle);
        cycle
            .checked_sub(1)
            .and_then(|index| self.records.get_mut(index as usize))
            .ok_or(err)
    }

    /// # Errors
    ///
    /// - [`PoolError::AlreadyActed`] on a second deposit in the cycle
    /// - [`PoolError::CycleOutOfRange`] for an unknown cycle
    pub fn record_deposit(&mut self, cycle: u32, position_id: PositionId) -> Result<(), PoolError> {
        let record = self.record_mut(cycle)?;
        if !record.depositors.insert(position_id) {
            return Err(PoolError::already_acted(
                "deposit",
                format!("position {position_id} already deposited in cycle {cycle}"),
            ));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// - [`PoolError::AlreadyActed`] on a second bid in the cycle
    /// - [`PoolError::CycleOutOfRange`] for an unknown cycle
    pub fn record_bid(
        &mut self,
        cycle: u32,
        position_id: PositionId,
        amount: Amount,
    ) -> Result<(), PoolError> {
        let record = self.record_mut(cycle)?;
        if record.bids.contains_key(&position_id) {
            return Err(PoolError::already_acted(
                "bid",
                format!("position {position_id} already bid in cycle {cycle}"),
            ));
        }
        record.bids.insert(position_id, amount);
        Ok(())
    }

    /// Stores the outcome. An outcome is written once.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvariantViolation`] if the cycle already has one.
    pub fn record_outcome(&mut self, outcome: CycleOutcome) -> Result<(), PoolError> {
        let cycle = outcome.cycle;
        let record = self.record_mut(cycle)?;
        if record.outcome.is_some() {
            return Err(PoolError::invariant(format!(
                "cycle {cycle} already has a recorded outcome"
            )));
        }
        record.outcome = Some(outcome);
        Ok(())
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &CycleOutcome> {
        self.records.iter().filter_map(|r| r.outcome.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_has_one_record_per_cycle() {
        let book = CycleBook::new(3);
        assert_eq!(book.record(1).unwrap().count, 1);
        assert_eq!(book.record(3).unwrap().count, 3);
        assert!(matches!(
            book.record(0),
            Err(PoolError::CycleOutOfRange { cycle: 0, total_cycles: 3 })
        ));
        assert!(book.record(4).is_err());
    }

    #[test]
    fn duplicate_deposit_and_bid_are_rejected() {
        let mut book = CycleBook::new(2);
        book.record_deposit(1, 0).unwrap();
        book.record_bid(1, 0, 40).unwrap();
        assert!(matches!(
            book.record_deposit(1, 0),
            Err(PoolError::AlreadyActed { operation: "deposit", .. })
        ));
        assert!(matches!(
            book.record_bid(1, 0, 10),
            Err(PoolError::AlreadyActed { operation: "bid", .. })
        ));
        assert_eq!(book.record(1).unwrap().bids[&0], 40);
    }

    #[test]
    fn provisional_lowest_bid_tracks_leader() {
        let mut book = CycleBook::new(1);
        book.record_bid(1, 2, 50).unwrap();
        book.record_bid(1, 1, 30).unwrap();
        let lowest = book.record(1).unwrap().lowest_bid().unwrap();
        assert_eq!(lowest.position_id, 1);
    }
}
