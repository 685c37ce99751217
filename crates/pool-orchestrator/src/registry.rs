use crate::actor::PoolActor;
use crate::error::OrchestratorError;
use crate::handle::PoolHandle;
use spiral_pool_core::{AppConfig, Clock, PoolId, PoolParams, RateSource};
use spiral_pool_engine::SpiralPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, RwLock};

/// Pools by id, each served by its own actor task.
pub struct PoolRegistry {
    pools: Arc<RwLock<HashMap<PoolId, PoolHandle>>>,
    config: AppConfig,
    clock: Arc<dyn Clock>,
    rates: Arc<dyn RateSource>,
}

impl PoolRegistry {
    /// Creates an empty registry. `clock` and `rates` are shared by every pool
    /// spawned without its own rate source.
    #[must_use]
    pub fn new(config: AppConfig, clock: Arc<dyn Clock>, rates: Arc<dyn RateSource>) -> Self {
        Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
            config,
            clock,
            rates,
        }
    }

    /// Spawns an actor for a new pool using the registry's rate source.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::DuplicatePool`] if the id is taken
    /// - [`OrchestratorError::Pool`] if the parameters are invalid
    pub async fn spawn_pool(&self, params: PoolParams) -> Result<PoolHandle, OrchestratorError> {
        self.spawn_pool_with_rates(params, self.rates.clone()).await
    }

    /// Spawns an actor for a new pool priced by `rates`.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::DuplicatePool`] if the id is taken
    /// - [`OrchestratorError::Pool`] if the parameters are invalid
    pub async fn spawn_pool_with_rates(
        &self,
        params: PoolParams,
        rates: Arc<dyn RateSource>,
    ) -> Result<PoolHandle, OrchestratorError> {
        let mut pools = self.pools.write().await;
        if pools.contains_key(&params.id) {
            return Err(OrchestratorError::DuplicatePool(params.id));
        }

        let pool_id = params.id.clone();
        let pool = SpiralPool::from_config(params, &self.config.engine)?;

        let (tx, rx) = mpsc::channel(self.config.orchestrator.command_buffer.max(1));
        let (event_tx, _) = broadcast::channel(self.config.orchestrator.event_buffer.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(pool.snapshot(self.clock.now()));

        let handle = PoolHandle::new(
            pool_id.clone(),
            tx,
            event_tx.clone(),
            snapshot_rx,
            self.clock.clone(),
        );
        let actor = PoolActor::new(pool, rx, self.clock.clone(), rates, event_tx, snapshot_tx);
        tokio::spawn(actor.run());

        pools.insert(pool_id.clone(), handle.clone());
        tracing::info!(pool_id = %pool_id, "Pool spawned");
        Ok(handle)
    }

    /// # Errors
    ///
    /// Returns [`OrchestratorError::PoolNotFound`] for an unknown id.
    pub async fn get_pool(&self, pool_id: &str) -> Result<PoolHandle, OrchestratorError> {
        self.pools
            .read()
            .await
            .get(pool_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::PoolNotFound(pool_id.to_string()))
    }

    pub async fn list_pools(&self) -> Vec<PoolId> {
        let mut ids: Vec<PoolId> = self.pools.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops the pool's actor and forgets it.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::PoolNotFound`] for an unknown id.
    pub async fn remove_pool(&self, pool_id: &str) -> Result<(), OrchestratorError> {
        let handle = self
            .pools
            .write()
            .await
            .remove(pool_id)
            .ok_or_else(|| OrchestratorError::PoolNotFound(pool_id.to_string()))?;
        if handle.shutdown().await.is_err() {
            tracing::warn!(pool_id, "Pool actor already stopped");
        }
        tracing::info!(pool_id, "Pool removed");
        Ok(())
    }

    /// Stops every actor.
    pub async fn shutdown_all(&self) {
        let handles: Vec<PoolHandle> = self.pools.write().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            if handle.shutdown().await.is_err() {
                tracing::warn!(pool_id = handle.pool_id(), "Pool actor already stopped");
            }
        }
    }
}
