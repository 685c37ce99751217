//! End-to-end pool scenarios driven through the public engine API.

use spiral_pool_core::{
    Address, AssetRef, CycleState, ErrorKind, PoolError, PoolParams, PoolState, Rate, SpiralYield,
    Timestamp,
};
use spiral_pool_engine::{
    DepositWeighted, EqualSplit, FinalizeOutcome, FullCycleAmount, NoSlashing, SpiralPool,
};
use std::sync::Arc;

const START: Timestamp = 10_000;
const CYCLE: u64 = 1_000;
const WINDOW: u64 = 400;

fn params() -> PoolParams {
    PoolParams {
        id: "scenario-pool".to_string(),
        base_token: AssetRef::new("USDC", "0xa0b8", 6),
        ybt: AssetRef::new("sUSDe", "0x9d39", 6),
        spiral_yield_token: AssetRef::new("SY", "0x5yie", 18),
        amount_cycle: 1_000_000,
        amount_collateral_in_base: 3_000_000,
        cycle_duration: CYCLE,
        cycle_deposit_and_bid_duration: WINDOW,
        total_cycles: 3,
        total_positions: 3,
        start_time: START,
    }
}

fn cycle_open(cycle: u32) -> Timestamp {
    START + u64::from(cycle - 1) * CYCLE
}

fn cycle_closed(cycle: u32) -> Timestamp {
    cycle_open(cycle) + WINDOW
}

fn joined_pool() -> SpiralPool {
    let mut pool = SpiralPool::new(params(), Arc::new(EqualSplit), Arc::new(NoSlashing)).unwrap();
    for owner in ["0xalice", "0xbob", "0xcarol"] {
        pool.join_pool(Address::from(owner), Rate::ONE, START - 500)
            .unwrap();
    }
    pool
}

fn finalized(outcome: FinalizeOutcome) -> spiral_pool_engine::CycleOutcome {
    match outcome {
        FinalizeOutcome::Finalized(outcome) => *outcome,
        FinalizeOutcome::AlreadyFinalized { cycle } => {
            panic!("cycle {cycle} was already finalized")
        }
    }
}

#[test]
fn full_cohort_goes_live_and_lowest_bid_wins() {
    let mut pool = joined_pool();
    assert_eq!(pool.pool_state(START - 1), PoolState::Waiting);
    assert_eq!(pool.pool_state(START), PoolState::Live);
    assert_eq!(pool.cycle_state(1, START).unwrap(), CycleState::DepositAndBid);

    let t = cycle_open(1);
    for id in 0..3 {
        pool.deposit_cycle(id, t).unwrap();
    }
    pool.bid_cycle(0, 500_000, t + 1).unwrap();
    pool.bid_cycle(1, 300_000, t + 2).unwrap();
    pool.bid_cycle(2, 400_000, t + 3).unwrap();
    assert_eq!(pool.lowest_bid(1).unwrap().unwrap().position_id, 1);

    // 3.0 base now costs 2_727_273 YBT, freeing 272_727 YBT per position.
    let rate = Rate::from_ratio(11, 10).unwrap();
    let outcome = finalized(pool.finalize_cycle(cycle_closed(1), rate).unwrap());
    let winner = outcome.winner.unwrap();
    assert_eq!(winner.position_id, 1);
    assert_eq!(winner.amount, 300_000);
    assert_eq!(outcome.liquidity, 3_000_000);
    assert_eq!(outcome.payout, outcome.liquidity);
    assert_eq!(pool.position(1).unwrap().winning_cycle, Some(1));
    assert_eq!(pool.cycles_finalized(), 1);

    for id in [0, 2] {
        assert_eq!(pool.collateral_yield(id).unwrap(), 272_727);
        assert_eq!(pool.spiral_yield(id).unwrap().amount_ybt, 136_363);
    }
    assert_eq!(pool.collateral_yield(1).unwrap(), 0);
    assert_eq!(pool.spiral_yield(1).unwrap().amount_ybt, 0);
}

#[test]
fn winner_is_locked_out_of_later_cycles() {
    let mut pool = joined_pool();
    let t = cycle_open(1);
    pool.deposit_cycle(1, t).unwrap();
    pool.bid_cycle(1, 100, t).unwrap();
    pool.finalize_cycle(cycle_closed(1), Rate::ONE).unwrap();

    let err = pool.deposit_cycle(1, cycle_open(2)).unwrap_err();
    assert!(matches!(err, PoolError::NotEligible { position_id: 1, .. }));
    assert_eq!(pool.position(1).unwrap().winning_cycle, Some(1));
}

#[test]
fn appreciation_accrues_to_non_winners_and_winner_forfeits() {
    let mut pool = joined_pool();
    let t = cycle_open(1);
    for id in 0..3 {
        pool.deposit_cycle(id, t).unwrap();
    }
    pool.bid_cycle(1, 3_000_000, t).unwrap();

    // 3.0 base now costs 2.0 YBT, freeing 1.0 YBT per position.
    let rate = Rate::from_ratio(3, 2).unwrap();
    let outcome = finalized(pool.finalize_cycle(cycle_closed(1), rate).unwrap());
    assert_eq!(outcome.payout, 3_000_000);
    assert_eq!(outcome.collateral_yield_accrued, 2_000_000);

    assert_eq!(pool.collateral_yield(0).unwrap(), 1_000_000);
    assert_eq!(pool.collateral_yield(2).unwrap(), 1_000_000);
    assert_eq!(pool.collateral_yield(1).unwrap(), 0);
    assert_eq!(pool.spiral_yield(0).unwrap().amount_ybt, 500_000);
    assert_eq!(pool.spiral_yield(2).unwrap().amount_ybt, 500_000);

    let claim = pool.claim_collateral_yield(0, cycle_closed(1) + 1).unwrap();
    assert_eq!(claim.amount_ybt, 1_000_000);
    assert_eq!(pool.collateral_yield(0).unwrap(), 0);
}

#[test]
fn underfilled_pool_is_discarded_and_each_holder_redeems_once() {
    let mut pool = SpiralPool::new(params(), Arc::new(EqualSplit), Arc::new(NoSlashing)).unwrap();
    pool.join_pool(Address::from("0xalice"), Rate::ONE, START - 10)
        .unwrap();
    pool.join_pool(Address::from("0xbob"), Rate::from_ratio(6, 5).unwrap(), START - 5)
        .unwrap();

    assert_eq!(
        pool.redeem_collateral_if_discarded(0, START - 1)
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(pool.pool_state(START), PoolState::Discarded);
    assert_eq!(pool.cycle_state(1, START).unwrap(), CycleState::NotStarted);

    let alice = pool.redeem_collateral_if_discarded(0, START).unwrap();
    let bob = pool.redeem_collateral_if_discarded(1, START + 1).unwrap();
    assert_eq!(alice.amount_ybt, 3_000_000);
    assert_eq!(bob.amount_ybt, 2_500_000);

    assert_eq!(
        pool.redeem_collateral_if_discarded(0, START + 2),
        Err(PoolError::AlreadyRedeemed { position_id: 0 })
    );
    assert_eq!(pool.ledger().total_redeemed_ybt, 5_500_000);
    assert_eq!(
        pool.deposit_cycle(0, START).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
}

#[test]
fn cycle_without_bids_has_no_winner_and_still_counts() {
    let mut pool = joined_pool();
    let t1 = cycle_open(1);
    for id in 0..3 {
        pool.deposit_cycle(id, t1).unwrap();
    }
    pool.bid_cycle(2, 2_500_000, t1).unwrap();
    pool.finalize_cycle(cycle_closed(1), Rate::ONE).unwrap();

    let t2 = cycle_open(2);
    pool.deposit_cycle(0, t2).unwrap();
    pool.deposit_cycle(1, t2).unwrap();
    let outcome = finalized(pool.finalize_cycle(cycle_closed(2), Rate::ONE).unwrap());

    assert_eq!(outcome.winner, None);
    assert_eq!(pool.lowest_bid(2).unwrap(), None);
    assert_eq!(pool.cycles_finalized(), 2);
    assert_eq!(outcome.carried_forward, 2_000_000);
    assert_eq!(pool.ledger().carried_forward, 2_000_000);
    assert!(pool
        .all_positions()
        .iter()
        .filter(|p| p.id != 2)
        .all(|p| p.winning_cycle.is_none()));

    let t3 = cycle_open(3);
    pool.deposit_cycle(0, t3).unwrap();
    pool.deposit_cycle(1, t3).unwrap();
    pool.bid_cycle(0, 3_000_000, t3).unwrap();
    let last = finalized(pool.finalize_cycle(cycle_closed(3), Rate::ONE).unwrap());
    // the winner takes the carried liquidity along with this cycle's deposits
    assert_eq!(last.liquidity, 4_000_000);
    assert_eq!(last.payout, 4_000_000);
    assert_eq!(pool.ledger().carried_forward, 0);
    assert_eq!(pool.ledger().total_paid_out, 3_000_000 + 4_000_000);
}

#[test]
fn final_cycle_without_winner_releases_carry_to_the_cohort() {
    let mut pool = joined_pool();
    let t3 = cycle_open(3);
    pool.finalize_cycle(t3, Rate::ONE).unwrap();
    pool.finalize_cycle(t3, Rate::ONE).unwrap();
    for id in 0..3 {
        pool.deposit_cycle(id, t3).unwrap();
    }

    let end = START + 3 * CYCLE;
    assert_eq!(pool.pool_state(end), PoolState::Ended);
    let last = finalized(pool.finalize_cycle(end, Rate::ONE).unwrap());
    assert_eq!(last.winner, None);
    assert_eq!(last.released_carry, 3_000_000);
    assert_eq!(last.carried_forward, 0);
    for id in 0..3 {
        assert_eq!(pool.spiral_yield(id).unwrap().amount_base, 1_000_000);
    }
    assert_eq!(
        pool.finalize_cycle(end, Rate::ONE).unwrap(),
        FinalizeOutcome::AlreadyFinalized { cycle: 3 }
    );
}

#[test]
fn winner_takes_deposits_and_slashed_collateral() {
    let mut pool =
        SpiralPool::new(params(), Arc::new(DepositWeighted), Arc::new(FullCycleAmount)).unwrap();
    for owner in ["0xalice", "0xbob", "0xcarol"] {
        pool.join_pool(Address::from(owner), Rate::ONE, 0).unwrap();
    }
    let t = cycle_open(1);
    pool.deposit_cycle(0, t).unwrap();
    pool.deposit_cycle(1, t).unwrap();
    pool.bid_cycle(0, 2_000_000, t).unwrap();

    let outcome = finalized(pool.finalize_cycle(cycle_closed(1), Rate::ONE).unwrap());
    assert_eq!(outcome.slashed_base, 1_000_000);
    assert_eq!(outcome.liquidity, 3_000_000);
    assert_eq!(outcome.payout, 3_000_000);
    assert_eq!(pool.position(2).unwrap().collateral_slashed, 1_000_000);
    assert_eq!(pool.spiral_yield(1).unwrap(), SpiralYield::default());
}

#[test]
fn finalizing_late_only_slashes_windows_that_opened() {
    let mut pool =
        SpiralPool::new(params(), Arc::new(EqualSplit), Arc::new(FullCycleAmount)).unwrap();
    for owner in ["0xalice", "0xbob", "0xcarol"] {
        pool.join_pool(Address::from(owner), Rate::ONE, 0).unwrap();
    }

    // Nobody finalizes cycle 1, so cycle 2 never opens.
    let blocked = cycle_open(2) + 1;
    assert_eq!(pool.cycle_state(2, blocked).unwrap(), CycleState::NotStarted);
    assert_eq!(
        pool.deposit_cycle(0, blocked).unwrap_err().kind(),
        ErrorKind::InvalidState
    );

    let end = START + 3 * CYCLE;
    let outcomes: Vec<_> = (0..3)
        .map(|_| finalized(pool.finalize_cycle(end, Rate::ONE).unwrap()))
        .collect();

    // Cycle 1's window was open and everyone skipped it.
    assert!(outcomes[0].window_opened);
    assert_eq!(outcomes[0].slashed_ybt, 3_000_000);
    for outcome in &outcomes[1..] {
        assert!(!outcome.window_opened);
        assert_eq!(outcome.slashed_ybt, 0);
    }
    assert_eq!(outcomes[2].released_carry, 3_000_000);

    for id in 0..3 {
        let position = pool.position(id).unwrap();
        assert_eq!(position.collateral_slashed, 1_000_000);
        assert_eq!(position.remaining_principal(), 2_000_000);
        assert_eq!(pool.spiral_yield(id).unwrap().amount_base, 1_000_000);
    }
}

#[test]
fn collateral_is_withdrawn_once_after_the_pool_ends() {
    let mut pool = joined_pool();
    let t = cycle_open(1);
    pool.deposit_cycle(0, t).unwrap();
    pool.bid_cycle(0, 500_000, t).unwrap();
    pool.finalize_cycle(cycle_closed(1), Rate::ONE).unwrap();

    let end = START + 3 * CYCLE;
    pool.finalize_cycle(end, Rate::ONE).unwrap();
    pool.finalize_cycle(end, Rate::ONE).unwrap();

    let back = pool.withdraw_collateral(0, end).unwrap();
    assert_eq!(back.amount_ybt, 3_000_000);
    assert_eq!(
        pool.withdraw_collateral(0, end + 1),
        Err(PoolError::AlreadyRedeemed { position_id: 0 })
    );
}

#[test]
fn snapshot_serializes_to_json() {
    let pool = joined_pool();
    let snapshot = pool.snapshot(START);
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["state"], "LIVE");
    assert_eq!(json["positions"].as_array().unwrap().len(), 3);
}
