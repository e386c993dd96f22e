//! Error types for pool operations

use std::time::Duration;
use thiserror::Error;

use crate::tasks::TaskError;

use super::TaskId;

/// Why a submitted task did not produce an output
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("task {task_id} timed out after {timeout:?}")]
    Timeout { task_id: TaskId, timeout: Duration },

    #[error("worker pool '{pool}' destroyed")]
    Destroyed { pool: String },

    #[error("worker pool '{name}' not found")]
    PoolNotFound { name: String },

    #[error("worker pools must be created inside a tokio runtime")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),

    #[error("failed to spawn worker thread for pool '{pool}'")]
    WorkerSpawn {
        pool: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl PoolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout { .. })
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, PoolError::Destroyed { .. })
    }
}
