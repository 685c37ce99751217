//! Collateral yield accrual and spiral yield distribution.
//!
//! Both run inside finalization on the working copy of the registry. Any
//! error aborts the whole finalization.

use crate::policy::YieldPolicy;
use crate::registry::PositionRegistry;
use spiral_pool_core::math::checked_add;
use spiral_pool_core::{
    Amount, PoolError, PoolLiquidityDelta, PoolParams, Position, PositionId, Rate, YieldSplit,
};
use std::collections::{BTreeMap, BTreeSet};

/// Result of marking every collateral to the current rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollateralAccrual {
    /// Credited to active positions as claimable collateral yield.
    pub accrued: Amount,
    /// Appreciation of winners' collateral, released to the cohort.
    pub forfeited: Amount,
}

/// Collateral in excess of what covers the required base value at `rate`.
fn excess_collateral(
    position: &Position,
    params: &PoolParams,
    rate: Rate,
) -> Result<Amount, PoolError> {
    let required = rate.base_to_ybt_ceil(params.amount_collateral_in_base)?;
    Ok(position
        .amount_collateral
        .saturating_sub(position.collateral_slashed)
        .saturating_sub(required))
}

/// Credits new collateral appreciation since the last finalization.
///
/// Appreciation is never taken back when the rate falls; it simply stops
/// accruing until the previous high is exceeded.
///
/// # Errors
///
/// Returns [`PoolError::Overflow`] on arithmetic overflow.
pub fn accrue_collateral_yield(
    registry: &mut PositionRegistry,
    params: &PoolParams,
    rate: Rate,
) -> Result<CollateralAccrual, PoolError> {
    let mut accrual = CollateralAccrual::default();

    for position in registry.iter_mut().filter(|p| !p.redeemed) {
        let excess = excess_collateral(position, params, rate)?;
        let delta = excess.saturating_sub(position.appreciation_accounted);
        if delta == 0 {
            continue;
        }
        position.appreciation_accounted =
            checked_add(position.appreciation_accounted, delta, "appreciation accounted")?;

        if position.is_active() {
            position.collateral_yield =
                checked_add(position.collateral_yield, delta, "collateral yield")?;
            accrual.accrued = checked_add(accrual.accrued, delta, "collateral yield total")?;
        } else {
            accrual.forfeited = checked_add(accrual.forfeited, delta, "forfeited appreciation")?;
        }
    }

    Ok(accrual)
}

/// Spiral yield credited by one finalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    pub splits: BTreeMap<PositionId, YieldSplit>,
    pub distributed: PoolLiquidityDelta,
    /// Rounding left over; carried into the next cycle.
    pub dust: PoolLiquidityDelta,
}

/// Asks `policy` for a split over the active positions, checks it and credits it.
///
/// # Errors
///
/// - [`PoolError::InvariantViolation`] if the policy pays a non-remaining
///   position or more than `delta`
/// - [`PoolError::Overflow`] on arithmetic overflow
pub fn distribute_spiral_yield(
    policy: &dyn YieldPolicy,
    registry: &mut PositionRegistry,
    delta: PoolLiquidityDelta,
) -> Result<Distribution, PoolError> {
    if delta.is_zero() {
        return Ok(Distribution::default());
    }

    let remaining: Vec<&Position> = registry.active().collect();
    let eligible: BTreeSet<PositionId> = remaining.iter().map(|p| p.id).collect();
    let splits = policy.distribute(&remaining, delta)?;

    let mut distributed = PoolLiquidityDelta::default();
    for (id, split) in &splits {
        if !eligible.contains(id) {
            return Err(PoolError::invariant(format!(
                "{} policy paid position {id}, which is not remaining",
                policy.name()
            )));
        }
        distributed.amount_base =
            checked_add(distributed.amount_base, split.amount_base, "distributed base")?;
        distributed.amount_ybt =
            checked_add(distributed.amount_ybt, split.amount_ybt, "distributed ybt")?;
    }
    if distributed.amount_base > delta.amount_base || distributed.amount_ybt > delta.amount_ybt {
        return Err(PoolError::invariant(format!(
            "{} policy distributed {}/{} out of {}/{}",
            policy.name(),
            distributed.amount_base,
            distributed.amount_ybt,
            delta.amount_base,
            delta.amount_ybt
        )));
    }

    for (id, split) in &splits {
        registry.get_mut(*id)?.spiral_yield.accrue(split)?;
    }

    Ok(Distribution {
        splits,
        distributed,
        dust: PoolLiquidityDelta {
            amount_base: delta.amount_base - distributed.amount_base,
            amount_ybt: delta.amount_ybt - distributed.amount_ybt,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::EqualSplit;
    use spiral_pool_core::{Address, AssetRef};

    fn params() -> PoolParams {
        PoolParams {
            id: "p".to_string(),
            base_token: AssetRef::new("USDC", "0x1", 6),
            ybt: AssetRef::new("aUSDC", "0x2", 6),
            spiral_yield_token: AssetRef::new("SY", "0x3", 18),
            amount_cycle: 100,
            amount_collateral_in_base: 300,
            cycle_duration: 100,
            cycle_deposit_and_bid_duration: 40,
            total_cycles: 3,
            total_positions: 3,
            start_time: 1_000,
        }
    }

    fn registry() -> PositionRegistry {
        let mut reg = PositionRegistry::new(3, 3);
        for owner in ["a", "b", "c"] {
            reg.register(Address::from(owner), 300, Rate::ONE).unwrap();
        }
        reg
    }

    #[derive(Debug)]
    struct Greedy;

    impl YieldPolicy for Greedy {
        fn distribute(
            &self,
            remaining: &[&Position],
            delta: PoolLiquidityDelta,
        ) -> Result<BTreeMap<PositionId, YieldSplit>, PoolError> {
            Ok(remaining
                .iter()
                .map(|p| {
                    (
                        p.id,
                        YieldSplit {
                            amount_base: delta.amount_base,
                            amount_ybt: 0,
                        },
                    )
                })
                .collect())
        }

        fn name(&self) -> &'static str {
            "greedy"
        }
    }

    #[derive(Debug)]
    struct PaysStranger;

    impl YieldPolicy for PaysStranger {
        fn distribute(
            &self,
            _: &[&Position],
            _: PoolLiquidityDelta,
        ) -> Result<BTreeMap<PositionId, YieldSplit>, PoolError> {
            Ok(BTreeMap::from([(99, YieldSplit::default())]))
        }

        fn name(&self) -> &'static str {
            "stranger"
        }
    }

    #[test]
    fn no_appreciation_at_join_rate() {
        let mut reg = registry();
        let accrual = accrue_collateral_yield(&mut reg, &params(), Rate::ONE).unwrap();
        assert_eq!(accrual, CollateralAccrual::default());
    }

    #[test]
    fn active_positions_accrue_and_winners_forfeit() {
        let mut reg = registry();
        reg.get_mut(1).unwrap().assign_win(1).unwrap();
        // 300 base now needs 200 YBT, freeing 100 per position
        let rate = Rate::from_ratio(3, 2).unwrap();
        let accrual = accrue_collateral_yield(&mut reg, &params(), rate).unwrap();
        assert_eq!(accrual.accrued, 200);
        assert_eq!(accrual.forfeited, 100);
        assert_eq!(reg.get(0).unwrap().collateral_yield, 100);
        assert_eq!(reg.get(1).unwrap().collateral_yield, 0);

        let again = accrue_collateral_yield(&mut reg, &params(), rate).unwrap();
        assert_eq!(again, CollateralAccrual::default());
    }

    #[test]
    fn falling_rate_does_not_claw_back() {
        let mut reg = registry();
        accrue_collateral_yield(&mut reg, &params(), Rate::from_ratio(3, 2).unwrap()).unwrap();
        let accrual = accrue_collateral_yield(&mut reg, &params(), Rate::ONE).unwrap();
        assert_eq!(accrual.accrued, 0);
        assert_eq!(reg.get(0).unwrap().collateral_yield, 100);
    }

    #[test]
    fn equal_distribution_leaves_dust() {
        let mut reg = registry();
        let delta = PoolLiquidityDelta {
            amount_base: 10,
            amount_ybt: 4,
        };
        let dist = distribute_spiral_yield(&EqualSplit, &mut reg, delta).unwrap();
        assert_eq!(dist.distributed.amount_base, 9);
        assert_eq!(dist.dust.amount_base, 1);
        assert_eq!(dist.dust.amount_ybt, 1);
        assert_eq!(reg.get(2).unwrap().spiral_yield.amount_base, 3);
    }

    #[test]
    fn overpaying_policy_is_an_invariant_violation() {
        let mut reg = registry();
        let delta = PoolLiquidityDelta {
            amount_base: 10,
            amount_ybt: 0,
        };
        let err = distribute_spiral_yield(&Greedy, &mut reg, delta).unwrap_err();
        assert!(matches!(err, PoolError::InvariantViolation(_)));
        assert_eq!(reg.get(0).unwrap().spiral_yield.amount_base, 0);
    }

    #[test]
    fn paying_unknown_position_is_an_invariant_violation() {
        let mut reg = registry();
        let delta = PoolLiquidityDelta {
            amount_base: 1,
            amount_ybt: 0,
        };
        assert!(matches!(
            distribute_spiral_yield(&PaysStranger, &mut reg, delta),
            Err(PoolError::InvariantViolation(_))
        ));
    }
}
