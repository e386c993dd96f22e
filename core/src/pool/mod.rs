//! Worker pool
//!
//! This module provides:
//! - **WorkerPool**: bounded set of worker threads fed from a priority queue,
//!   with per-task deadlines, progress forwarding and idle reclamation
//! - **PoolRegistry**: named pools created on demand, sharing one logger
//! - **Workload**: the seam between the pool and what it runs
//!
//! # Task lifecycle
//!
//! ```text
//!   execute() ──► queued ──► in flight ──► completed
//!                   │            │
//!                   │            ├──► failed (task error / panic)
//!                   ├────────────┴──► failed (timeout, token tripped)
//!                   └────────────────► failed (pool destroyed)
//! ```
//!
//! A timed-out task keeps its worker until the execution returns; whatever it
//! returns then is discarded.

mod error;
mod handle;
pub mod registry;
mod stats;
mod worker;
mod worker_pool;

#[cfg(test)]
mod pool_tests;

pub use error::PoolError;
pub use handle::{TaskHandle, TaskId};
pub use registry::{DEFAULT_POOL, PoolRegistry};
pub use stats::PoolStats;
pub use worker_pool::WorkerPool;

use crate::tasks::{TaskContext, TaskError};

/// What a pool executes.
///
/// `execute` runs on a worker thread and should poll
/// [`TaskContext::checkpoint`] in long loops so timeouts can stop it early.
pub trait Workload: Send + Sync + 'static {
    type Request: Send + 'static;
    type Output: Send + 'static;

    /// Short name used in logs and errors
    fn task_type(&self, request: &Self::Request) -> &'static str;

    fn execute(&self, request: Self::Request, ctx: &TaskContext)
    -> Result<Self::Output, TaskError>;
}
