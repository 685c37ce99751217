//! Pluggable economics: how spiral yield is split and how missed deposits are
//! punished.

use spiral_pool_core::math::mul_div_floor;
use spiral_pool_core::{
    Amount, PoolError, PoolLiquidityDelta, Position, PositionId, Rate, SlashingKind,
    YieldPolicyKind, YieldSplit,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Splits one finalization's released value among the remaining positions.
///
/// Implementations must be pure. The engine rejects splits that pay unknown
/// ids or add up to more than `delta`.
pub trait YieldPolicy: Send + Sync + std::fmt::Debug {
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] if share arithmetic overflows.
    fn distribute(
        &self,
        remaining: &[&Position],
        delta: PoolLiquidityDelta,
    ) -> Result<BTreeMap<PositionId, YieldSplit>, PoolError>;

    fn name(&self) -> &'static str;
}

/// Same share for every remaining position.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualSplit;

impl YieldPolicy for EqualSplit {
    fn distribute(
        &self,
        remaining: &[&Position],
        delta: PoolLiquidityDelta,
    ) -> Result<BTreeMap<PositionId, YieldSplit>, PoolError> {
        let count = remaining.len() as u128;
        if count == 0 {
            return Ok(BTreeMap::new());
        }
        let share = YieldSplit {
            amount_base: delta.amount_base / count,
            amount_ybt: delta.amount_ybt / count,
        };
        Ok(remaining.iter().map(|p| (p.id, share)).collect())
    }

    fn name(&self) -> &'static str {
        "equal"
    }
}

/// Shares proportional to the number of cycles each position paid into.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepositWeighted;

impl YieldPolicy for DepositWeighted {
    fn distribute(
        &self,
        remaining: &[&Position],
        delta: PoolLiquidityDelta,
    ) -> Result<BTreeMap<PositionId, YieldSplit>, PoolError> {
        let total_weight: u128 = remaining
            .iter()
            .map(|p| u128::from(p.deposit_count()))
            .sum();
        if total_weight == 0 {
            return EqualSplit.distribute(remaining, delta);
        }

        remaining
            .iter()
            .map(|p| {
                let weight = u128::from(p.deposit_count());
                let split = YieldSplit {
                    amount_base: mul_div_floor(
                        delta.amount_base,
                        weight,
                        total_weight,
                        "weighted base share",
                    )?,
                    amount_ybt: mul_div_floor(
                        delta.amount_ybt,
                        weight,
                        total_weight,
                        "weighted ybt share",
                    )?,
                };
                Ok((p.id, split))
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "deposit_weighted"
    }
}

/// Collateral taken from a position that missed a cycle deposit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slash {
    /// YBT removed from the collateral.
    pub amount_ybt: Amount,
    /// Base value added to the cycle's liquidity.
    pub amount_base: Amount,
}

pub trait SlashingPolicy: Send + Sync + std::fmt::Debug {
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] on conversion overflow.
    fn slash(&self, position: &Position, amount_cycle: Amount, rate: Rate)
        -> Result<Slash, PoolError>;

    fn name(&self) -> &'static str;
}

/// Takes YBT worth one cycle deposit, capped by what is left of the collateral.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullCycleAmount;

impl SlashingPolicy for FullCycleAmount {
    fn slash(
        &self,
        position: &Position,
        amount_cycle: Amount,
        rate: Rate,
    ) -> Result<Slash, PoolError> {
        let needed = rate.base_to_ybt_ceil(amount_cycle)?;
        let available = position.remaining_principal();
        if needed <= available {
            return Ok(Slash {
                amount_ybt: needed,
                amount_base: amount_cycle,
            });
        }
        Ok(Slash {
            amount_ybt: available,
            amount_base: rate.ybt_to_base_floor(available)?,
        })
    }

    fn name(&self) -> &'static str {
        "full_cycle_amount"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSlashing;

impl SlashingPolicy for NoSlashing {
    fn slash(&self, _: &Position, _: Amount, _: Rate) -> Result<Slash, PoolError> {
        Ok(Slash::default())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[must_use]
pub fn yield_policy_for(kind: YieldPolicyKind) -> Arc<dyn YieldPolicy> {
    match kind {
        YieldPolicyKind::Equal => Arc::new(EqualSplit),
        YieldPolicyKind::DepositWeighted => Arc::new(DepositWeighted),
    }
}

#[must_use]
pub fn slashing_policy_for(kind: SlashingKind) -> Arc<dyn SlashingPolicy> {
    match kind {
        SlashingKind::FullCycleAmount => Arc::new(FullCycleAmount),
        SlashingKind::Disabled => Arc::new(NoSlashing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiral_pool_core::Address;

    fn position(id: u32, deposits: &[u32]) -> Position {
        let mut p = Position::new(id, Address::new(format!("owner-{id}")), 300, Rate::ONE, 3);
        for cycle in deposits {
            p.mark_deposited(*cycle).unwrap();
        }
        p
    }

    fn delta(amount_base: Amount, amount_ybt: Amount) -> PoolLiquidityDelta {
        PoolLiquidityDelta {
            amount_base,
            amount_ybt,
        }
    }

    #[test]
    fn equal_split_floors_each_share() {
        let a = position(0, &[]);
        let b = position(2, &[]);
        let splits = EqualSplit.distribute(&[&a, &b], delta(21, 5)).unwrap();
        assert_eq!(splits[&0].amount_base, 10);
        assert_eq!(splits[&2].amount_ybt, 2);
    }

    #[test]
    fn equal_split_with_nobody_left_pays_nothing() {
        assert!(EqualSplit.distribute(&[], delta(100, 100)).unwrap().is_empty());
    }

    #[test]
    fn deposit_weighted_follows_deposit_counts() {
        let a = position(0, &[1, 2]);
        let b = position(1, &[1]);
        let splits = DepositWeighted.distribute(&[&a, &b], delta(90, 30)).unwrap();
        assert_eq!(splits[&0].amount_base, 60);
        assert_eq!(splits[&1].amount_base, 30);
        assert_eq!(splits[&0].amount_ybt, 20);
    }

    #[test]
    fn deposit_weighted_without_deposits_is_equal() {
        let a = position(0, &[]);
        let b = position(1, &[]);
        let splits = DepositWeighted.distribute(&[&a, &b], delta(10, 0)).unwrap();
        assert_eq!(splits[&0].amount_base, 5);
        assert_eq!(splits[&1].amount_base, 5);
    }

    #[test]
    fn full_cycle_slash_takes_one_deposit_worth() {
        let p = position(0, &[]);
        let rate = Rate::from_ratio(5, 4).unwrap();
        let slash = FullCycleAmount.slash(&p, 100, rate).unwrap();
        assert_eq!(slash.amount_ybt, 80);
        assert_eq!(slash.amount_base, 100);
    }

    #[test]
    fn full_cycle_slash_is_capped_by_collateral() {
        let mut p = position(0, &[]);
        p.collateral_slashed = 250;
        let slash = FullCycleAmount.slash(&p, 100, Rate::ONE).unwrap();
        assert_eq!(slash.amount_ybt, 50);
        assert_eq!(slash.amount_base, 50);
    }

    #[test]
    fn disabled_slashing_takes_nothing() {
        let p = position(0, &[]);
        assert_eq!(NoSlashing.slash(&p, 100, Rate::ONE).unwrap(), Slash::default());
    }

    #[test]
    fn factories_follow_config_kinds() {
        assert_eq!(yield_policy_for(YieldPolicyKind::DepositWeighted).name(), "deposit_weighted");
        assert_eq!(slashing_policy_for(SlashingKind::Disabled).name(), "disabled");
    }
}
