use crate::commands::{PoolCommand, Reply};
use crate::error::OrchestratorError;
use spiral_pool_core::{
    Address, Amount, Clock, CycleState, LowestBid, PoolError, PoolEvent, PoolId, PoolState,
    PositionId, Rate,
};
use spiral_pool_engine::{compute_state, Claim, FinalizeOutcome, PoolSnapshot, Redemption};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Cloneable client for one pool actor.
///
/// Writes go through the actor's queue. Reads of committed state come from
/// the latest published snapshot and never wait on the actor.
#[derive(Clone)]
pub struct PoolHandle {
    pool_id: PoolId,
    tx: mpsc::Sender<PoolCommand>,
    event_tx: broadcast::Sender<PoolEvent>,
    snapshot_rx: watch::Receiver<PoolSnapshot>,
    clock: Arc<dyn Clock>,
}

impl PoolHandle {
    #[must_use]
    pub fn new(
        pool_id: PoolId,
        tx: mpsc::Sender<PoolCommand>,
        event_tx: broadcast::Sender<PoolEvent>,
        snapshot_rx: watch::Receiver<PoolSnapshot>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool_id,
            tx,
            event_tx,
            snapshot_rx,
            clock,
        }
    }

    #[must_use]
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    fn stopped(&self) -> OrchestratorError {
        OrchestratorError::ActorStopped(self.pool_id.clone())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> PoolCommand,
    ) -> Result<T, OrchestratorError> {
        let (reply, rx) = oneshot::channel::<Result<T, PoolError>>();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| self.stopped())?;
        let result = rx.await.map_err(|_| self.stopped())?;
        Ok(result?)
    }

    /// Joins the pool for `owner` at the actor's current YBT rate.
    ///
    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn join_pool(&self, owner: Address) -> Result<PositionId, OrchestratorError> {
        self.request(|reply| PoolCommand::Join { owner, reply }).await
    }

    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn deposit_cycle(&self, position_id: PositionId) -> Result<Amount, OrchestratorError> {
        self.request(|reply| PoolCommand::Deposit { position_id, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn bid_cycle(
        &self,
        position_id: PositionId,
        amount: Amount,
    ) -> Result<(), OrchestratorError> {
        self.request(|reply| PoolCommand::Bid {
            position_id,
            amount,
            reply,
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn finalize_cycle(&self) -> Result<FinalizeOutcome, OrchestratorError> {
        self.request(|reply| PoolCommand::Finalize { reply }).await
    }

    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn finalize_cycle_at(&self, cycle: u32) -> Result<FinalizeOutcome, OrchestratorError> {
        self.request(|reply| PoolCommand::FinalizeAt { cycle, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn claim_collateral_yield(
        &self,
        position_id: PositionId,
    ) -> Result<Claim, OrchestratorError> {
        self.request(|reply| PoolCommand::ClaimCollateralYield { position_id, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn claim_spiral_yield(
        &self,
        position_id: PositionId,
    ) -> Result<Claim, OrchestratorError> {
        self.request(|reply| PoolCommand::ClaimSpiralYield { position_id, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn redeem_collateral_if_discarded(
        &self,
        position_id: PositionId,
    ) -> Result<Redemption, OrchestratorError> {
        self.request(|reply| PoolCommand::RedeemIfDiscarded { position_id, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn withdraw_collateral(
        &self,
        position_id: PositionId,
    ) -> Result<Redemption, OrchestratorError> {
        self.request(|reply| PoolCommand::WithdrawCollateral { position_id, reply })
            .await
    }

    /// Winner of a finalized cycle or the leader of the open one.
    ///
    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn lowest_bid(&self, cycle: u32) -> Result<Option<LowestBid>, OrchestratorError> {
        self.request(|reply| PoolCommand::LowestBid { cycle, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn cycle_state(&self, cycle: u32) -> Result<CycleState, OrchestratorError> {
        self.request(|reply| PoolCommand::CycleState { cycle, reply })
            .await
    }

    /// Current YBT rate and the collateral a join would lock at it.
    ///
    /// # Errors
    ///
    /// Returns the engine's rejection or [`OrchestratorError::ActorStopped`].
    pub async fn required_collateral(&self) -> Result<(Rate, Amount), OrchestratorError> {
        self.request(|reply| PoolCommand::RequiredCollateral { reply })
            .await
    }

    /// Asks the actor to republish its snapshot and waits for it.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::ActorStopped`] if the actor is gone.
    pub async fn refresh(&self) -> Result<PoolSnapshot, OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PoolCommand::Refresh { reply })
            .await
            .map_err(|_| self.stopped())?;
        rx.await.map_err(|_| self.stopped())
    }

    /// # Errors
    ///
    /// Returns [`OrchestratorError::ActorStopped`] if the actor is already gone.
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        self.tx
            .send(PoolCommand::Shutdown)
            .await
            .map_err(|_| self.stopped())
    }

    /// Latest committed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Pool state at the clock's current time, derived from the latest snapshot.
    #[must_use]
    pub fn pool_state(&self) -> PoolState {
        let snapshot = self.snapshot_rx.borrow();
        compute_state(
            snapshot.params.start_time,
            snapshot.params.end_time(),
            snapshot.params.total_positions,
            snapshot.positions_filled,
            self.clock.now(),
        )
    }

    /// Subscribes to events committed after this call.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<PoolEvent> {
        self.event_tx.subscribe()
    }

    /// Receiver that wakes on every republished snapshot.
    #[must_use]
    pub fn watch_snapshots(&self) -> watch::Receiver<PoolSnapshot> {
        self.snapshot_rx.clone()
    }
}
