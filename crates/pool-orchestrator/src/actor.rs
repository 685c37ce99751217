use crate::commands::{PoolCommand, Reply};
use spiral_pool_core::{Clock, PoolError, PoolEvent, PoolEventKind, PoolState, RateSource};
use spiral_pool_engine::{PoolSnapshot, SpiralPool};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Single writer for one pool.
///
/// Owns the [`SpiralPool`] and applies commands in arrival order. Before each
/// reply the committed snapshot is republished and new events broadcast.
pub struct PoolActor {
    pool: SpiralPool,
    rx: mpsc::Receiver<PoolCommand>,
    clock: Arc<dyn Clock>,
    rates: Arc<dyn RateSource>,
    event_tx: broadcast::Sender<PoolEvent>,
    snapshot_tx: watch::Sender<PoolSnapshot>,
    last_state: PoolState,
}

impl PoolActor {
    /// Creates an actor for `pool`.
    #[must_use]
    pub fn new(
        pool: SpiralPool,
        rx: mpsc::Receiver<PoolCommand>,
        clock: Arc<dyn Clock>,
        rates: Arc<dyn RateSource>,
        event_tx: broadcast::Sender<PoolEvent>,
        snapshot_tx: watch::Sender<PoolSnapshot>,
    ) -> Self {
        let last_state = pool.pool_state(clock.now());
        Self {
            pool,
            rx,
            clock,
            rates,
            event_tx,
            snapshot_tx,
            last_state,
        }
    }

    /// Publishes the outcome, then answers the caller, so a caller that saw
    /// the reply also sees the new snapshot.
    fn reply<T>(&mut self, operation: &str, reply: Reply<T>, result: Result<T, PoolError>) {
        if let Err(err) = &result {
            tracing::warn!(
                pool_id = %self.pool.params().id,
                operation,
                error = %err,
                "Command rejected"
            );
        }
        self.publish();
        // Caller may have gone away; the command still committed.
        let _ = reply.send(result);
    }

    /// Broadcasts pending events and publishes the latest snapshot.
    fn publish(&mut self) {
        let now = self.clock.now();
        let state = self.pool.pool_state(now);
        let mut events = self.pool.drain_events();
        if state != self.last_state {
            tracing::info!(
                pool_id = %self.pool.params().id,
                from = %self.last_state,
                to = %state,
                "Pool state changed"
            );
            events.push(PoolEvent {
                pool_id: self.pool.params().id.clone(),
                at: now,
                kind: PoolEventKind::StateChanged {
                    from: self.last_state,
                    to: state,
                },
            });
            self.last_state = state;
        }

        for event in events {
            // No subscribers is fine.
            let _ = self.event_tx.send(event);
        }
        self.snapshot_tx.send_replace(self.pool.snapshot(now));
    }

    /// Processes commands until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!(pool_id = %self.pool.params().id, "Pool actor starting");
        self.publish();

        while let Some(cmd) = self.rx.recv().await {
            let now = self.clock.now();
            match cmd {
                PoolCommand::Join { owner, reply } => {
                    let rate = self.rates.ybt_rate();
                    let result = self.pool.join_pool(owner, rate, now);
                    self.reply("join", reply, result);
                }
                PoolCommand::Deposit { position_id, reply } => {
                    let result = self.pool.deposit_cycle(position_id, now);
                    self.reply("deposit", reply, result);
                }
                PoolCommand::Bid {
                    position_id,
                    amount,
                    reply,
                } => {
                    let result = self.pool.bid_cycle(position_id, amount, now);
                    self.reply("bid", reply, result);
                }
                PoolCommand::Finalize { reply } => {
                    let rate = self.rates.ybt_rate();
                    let result = self.pool.finalize_cycle(now, rate);
                    self.reply("finalize", reply, result);
                }
                PoolCommand::FinalizeAt { cycle, reply } => {
                    let rate = self.rates.ybt_rate();
                    let result = self.pool.finalize_cycle_at(cycle, now, rate);
                    self.reply("finalize", reply, result);
                }
                PoolCommand::ClaimCollateralYield { position_id, reply } => {
                    let result = self.pool.claim_collateral_yield(position_id, now);
                    self.reply("claim collateral yield", reply, result);
                }
                PoolCommand::ClaimSpiralYield { position_id, reply } => {
                    let result = self.pool.claim_spiral_yield(position_id, now);
                    self.reply("claim spiral yield", reply, result);
                }
                PoolCommand::RedeemIfDiscarded { position_id, reply } => {
                    let result = self.pool.redeem_collateral_if_discarded(position_id, now);
                    self.reply("redeem", reply, result);
                }
                PoolCommand::WithdrawCollateral { position_id, reply } => {
                    let result = self.pool.withdraw_collateral(position_id, now);
                    self.reply("withdraw", reply, result);
                }
                PoolCommand::LowestBid { cycle, reply } => {
                    let result = self.pool.lowest_bid(cycle);
                    self.reply("lowest bid", reply, result);
                }
                PoolCommand::CycleState { cycle, reply } => {
                    let result = self.pool.cycle_state(cycle, now);
                    self.reply("cycle state", reply, result);
                }
                PoolCommand::RequiredCollateral { reply } => {
                    let rate = self.rates.ybt_rate();
                    let result = self.pool.required_collateral(rate).map(|amount| (rate, amount));
                    self.reply("required collateral", reply, result);
                }
                PoolCommand::Refresh { reply } => {
                    self.publish();
                    let _ = reply.send(self.snapshot_tx.borrow().clone());
                }
                PoolCommand::Shutdown => {
                    tracing::info!(pool_id = %self.pool.params().id, "Pool actor shutting down");
                    self.publish();
                    break;
                }
            }
        }

        tracing::info!(pool_id = %self.pool.params().id, "Pool actor stopped");
    }
}
