//! Simulation report and its text rendering.

use crate::amounts::{format_amount, format_rate, format_time};
use serde::Serialize;
use spiral_pool_core::{Cycle, ErrorKind, PoolEvent, PoolParams, PositionId, Rate, Timestamp};
use spiral_pool_engine::{Claim, CycleOutcome, FinalizeOutcome, PoolSnapshot, Redemption};

/// What a successful step produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepResult {
    ClockMoved { to: Timestamp },
    RateSet { rate: Rate },
    Joined { position_id: PositionId },
    Deposited { amount: u128 },
    BidPlaced,
    Finalized { outcome: FinalizeOutcome },
    Claimed { claim: Claim },
    Redeemed { redemption: Redemption },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub at: Timestamp,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepRecord>,
    pub events: Vec<PoolEvent>,
    pub snapshot: PoolSnapshot,
}

impl SimulationReport {
    #[must_use]
    pub fn rejected_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.error.is_some()).count()
    }

    fn base(&self, amount: u128) -> String {
        let token = &self.snapshot.params.base_token;
        format_amount(amount, token.decimals, &token.symbol)
    }

    fn ybt(&self, amount: u128) -> String {
        let token = &self.snapshot.params.ybt;
        format_amount(amount, token.decimals, &token.symbol)
    }

    fn describe(&self, result: &StepResult) -> String {
        match result {
            StepResult::ClockMoved { to } => format!("clock -> {}", format_time(*to)),
            StepResult::RateSet { rate } => format!("rate -> {}", format_rate(*rate)),
            StepResult::Joined { position_id } => format!("position {position_id}"),
            StepResult::Deposited { amount } => self.base(*amount),
            StepResult::BidPlaced => "accepted".to_string(),
            StepResult::Finalized {
                outcome: FinalizeOutcome::AlreadyFinalized { cycle },
            } => format!("cycle {cycle} already finalized"),
            StepResult::Finalized {
                outcome: FinalizeOutcome::Finalized(outcome),
            } => self.describe_outcome(outcome),
            StepResult::Claimed { claim } => format!(
                "{} + {}",
                self.base(claim.amount_base),
                self.ybt(claim.amount_ybt)
            ),
            StepResult::Redeemed { redemption } => self.ybt(redemption.amount_ybt),
        }
    }

    fn describe_outcome(&self, outcome: &CycleOutcome) -> String {
        match outcome.winner {
            Some(winner) => format!(
                "cycle {}: position {} wins {} of {}",
                outcome.cycle,
                winner.position_id,
                self.base(outcome.payout),
                self.base(outcome.liquidity)
            ),
            None => format!(
                "cycle {}: no winner, {} carried",
                outcome.cycle,
                self.base(outcome.carried_forward)
            ),
        }
    }

    /// Prints the report for a terminal.
    pub fn print(&self) {
        let snapshot = &self.snapshot;
        let params = &snapshot.params;

        println!("Pool {} ({})", params.id, snapshot.state);
        println!(
            "  cycles finalized: {}/{}   positions: {}/{}",
            snapshot.cycles_finalized,
            params.total_cycles,
            snapshot.positions_filled,
            params.total_positions
        );
        println!();
        println!("Steps:");
        for step in &self.steps {
            let detail = match (&step.result, &step.error) {
                (Some(result), _) => self.describe(result),
                (None, Some(error)) => format!("REJECTED: {error}"),
                (None, None) => String::new(),
            };
            println!(
                "  #{:<3} {}  {:<24} {}",
                step.index,
                format_time(step.at),
                step.action,
                detail
            );
        }

        println!();
        println!("Positions:");
        println!(
            "  {:<4} {:<14} {:>6} {:>22} {:>22} {:>22}",
            "id", "owner", "won", "collateral yield", "spiral (base)", "spiral (ybt)"
        );
        for position in &snapshot.positions {
            println!(
                "  {:<4} {:<14} {:>6} {:>22} {:>22} {:>22}",
                position.id,
                position.owner.as_str(),
                position
                    .winning_cycle
                    .map_or_else(|| "-".to_string(), |c| c.to_string()),
                self.ybt(position.collateral_yield),
                self.base(position.spiral_yield.amount_base),
                self.ybt(position.spiral_yield.amount_ybt),
            );
        }

        let ledger = &snapshot.ledger;
        println!();
        println!("Ledger:");
        println!("  deposited:        {}", self.base(ledger.total_deposited));
        println!("  paid to winners:  {}", self.base(ledger.total_paid_out));
        println!("  carried forward:  {}", self.base(ledger.carried_forward));
        println!("  slashed:          {}", self.ybt(ledger.total_slashed_ybt));
        println!("  redeemed:         {}", self.ybt(ledger.total_redeemed_ybt));
        if self.rejected_steps() > 0 {
            println!();
            println!("{} step(s) rejected", self.rejected_steps());
        }
    }
}

/// Prints the cycle timetable of a pool.
pub fn print_schedule(params: &PoolParams, cycles: &[Cycle]) {
    println!("Pool {} schedule", params.id);
    println!("  start: {}", format_time(params.start_time));
    println!("  end:   {}", format_time(params.end_time()));
    println!(
        "  per cycle: {} deposit, collateral worth {}",
        format_amount(
            params.amount_cycle,
            params.base_token.decimals,
            &params.base_token.symbol
        ),
        format_amount(
            params.amount_collateral_in_base,
            params.base_token.decimals,
            &params.base_token.symbol
        ),
    );
    println!();
    println!(
        "  {:<6} {:<24} {:<24} {:<24}",
        "cycle", "opens", "bidding closes", "ends"
    );
    for cycle in cycles {
        println!(
            "  {:<6} {:<24} {:<24} {:<24}",
            cycle.count,
            format_time(cycle.start_time),
            format_time(cycle.deposit_and_bid_end_time),
            format_time(cycle.end_time)
        );
    }
}
