//! Named worker pools
//!
//! The registry is an ordinary value: construct one where the application
//! wires its services and pass it (or an `Arc` of it) to whoever submits work.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use fightline_types::{PoolConfig, ReplayConfig};
use hashbrown::HashMap;
use tracing::Dispatch;

use crate::tasks::{CombatWorkload, ProgressCallback, TaskOutput, TaskRequest};

use super::{PoolError, PoolStats, TaskHandle, WorkerPool, Workload};

/// Pool used by [`PoolRegistry::execute_task`] when no name is given
pub const DEFAULT_POOL: &str = "default";

pub struct PoolRegistry<W: Workload> {
    workload: Arc<W>,
    config: ReplayConfig,
    logger: OnceLock<Dispatch>,
    pools: RwLock<HashMap<String, Arc<WorkerPool<W>>>>,
}

impl<W: Workload> PoolRegistry<W> {
    pub fn new(workload: W) -> Self {
        Self::with_config(workload, ReplayConfig::default())
    }

    /// Pools take their settings from `config.pools[name]`, falling back to
    /// `config.default_pool`.
    pub fn with_config(workload: W, config: ReplayConfig) -> Self {
        Self {
            workload: Arc::new(workload),
            config,
            logger: OnceLock::new(),
            pools: RwLock::new(HashMap::new()),
        }
    }

    fn read_pools(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<WorkerPool<W>>>> {
        self.pools.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_pools(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<WorkerPool<W>>>> {
        self.pools.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the subscriber handed to pools created from now on.
    /// Only the first call has any effect; returns whether it was applied.
    pub fn set_logger(&self, dispatch: Dispatch) -> bool {
        self.logger.set(dispatch).is_ok()
    }

    /// Return the named pool, creating it if needed. `config` is ignored when
    /// the pool already exists.
    pub fn create_pool(
        &self,
        name: &str,
        config: Option<PoolConfig>,
    ) -> Result<Arc<WorkerPool<W>>, PoolError> {
        let mut pools = self.write_pools();
        if let Some(pool) = pools.get(name) {
            return Ok(Arc::clone(pool));
        }

        let config = config.unwrap_or_else(|| self.config.pool(name).clone());
        let pool = Arc::new(WorkerPool::build(
            name.to_string(),
            config,
            Arc::clone(&self.workload),
            self.logger.get().cloned(),
        )?);
        pools.insert(name.to_string(), Arc::clone(&pool));
        tracing::debug!(pool = name, "Registered worker pool");
        Ok(pool)
    }

    pub fn get_pool(&self, name: &str) -> Option<Arc<WorkerPool<W>>> {
        self.read_pools().get(name).cloned()
    }

    pub fn pool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_pools().keys().cloned().collect();
        names.sort();
        names
    }

    /// Submit to an existing pool.
    pub fn execute(
        &self,
        pool_name: &str,
        request: W::Request,
        priority: i32,
        on_progress: Option<ProgressCallback>,
    ) -> Result<TaskHandle<W::Output>, PoolError> {
        let pool = self
            .get_pool(pool_name)
            .ok_or_else(|| PoolError::PoolNotFound {
                name: pool_name.to_string(),
            })?;
        Ok(pool.execute(request, priority, on_progress))
    }

    /// Submit at priority 0, creating the pool (default: [`DEFAULT_POOL`])
    /// if it does not exist yet.
    pub fn execute_task(
        &self,
        request: W::Request,
        on_progress: Option<ProgressCallback>,
        pool_name: Option<&str>,
    ) -> Result<TaskHandle<W::Output>, PoolError> {
        let pool = self.create_pool(pool_name.unwrap_or(DEFAULT_POOL), None)?;
        Ok(pool.execute(request, 0, on_progress))
    }

    /// Stats for one pool, or the sum over all pools when `name` is `None`.
    pub fn stats(&self, name: Option<&str>) -> Option<PoolStats> {
        let pools = self.read_pools();
        match name {
            Some(name) => pools.get(name).map(|pool| pool.stats()),
            None => Some(pools.values().fold(PoolStats::default(), |mut total, pool| {
                total.merge(&pool.stats());
                total
            })),
        }
    }

    pub fn all_stats(&self) -> BTreeMap<String, PoolStats> {
        self.read_pools()
            .iter()
            .map(|(name, pool)| (name.clone(), pool.stats()))
            .collect()
    }

    /// Destroy and forget one pool, or every pool when `name` is `None`.
    /// Returns how many pools were removed.
    pub fn destroy_pool(&self, name: Option<&str>) -> usize {
        let removed: Vec<Arc<WorkerPool<W>>> = {
            let mut pools = self.write_pools();
            match name {
                Some(name) => pools.remove(name).into_iter().collect(),
                None => pools.drain().map(|(_, pool)| pool).collect(),
            }
        };
        for pool in &removed {
            pool.destroy();
            tracing::debug!(pool = pool.name(), "Destroyed worker pool");
        }
        removed.len()
    }
}

impl PoolRegistry<CombatWorkload> {
    pub fn combat(config: ReplayConfig) -> Self {
        Self::with_config(CombatWorkload, config)
    }

    /// Submit a string-keyed task message. Unknown task types and malformed
    /// payloads are rejected here without touching the pool.
    pub fn execute_named(
        &self,
        pool_name: &str,
        task_type: &str,
        data: serde_json::Value,
        priority: i32,
        on_progress: Option<ProgressCallback>,
    ) -> Result<TaskHandle<TaskOutput>, PoolError> {
        let request = TaskRequest::from_named(task_type, data)?;
        self.execute(pool_name, request, priority, on_progress)
    }
}

impl<W: Workload> Drop for PoolRegistry<W> {
    fn drop(&mut self) {
        self.destroy_pool(None);
    }
}
