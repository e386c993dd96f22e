//! Priority task queue and bounded worker pool

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BinaryHeap};
use std::io;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use fightline_types::PoolConfig;
use hashbrown::HashMap;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Dispatch, debug, error, info, warn};

use crate::tasks::{CancelToken, ProgressCallback, TaskContext, TaskError};

use super::handle::Reply;
use super::stats::DurationWindow;
use super::worker::{Job, WorkerId, WorkerSlot};
use super::{PoolError, PoolStats, TaskHandle, TaskId, Workload};

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Routes pool log lines to an injected subscriber, or the global one.
/// Silent unless `enable_logging` is set.
#[derive(Clone, Default)]
struct PoolLogger {
    enabled: bool,
    dispatch: Option<Dispatch>,
}

impl PoolLogger {
    fn emit(&self, log: impl FnOnce()) {
        if !self.enabled {
            return;
        }
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, log),
            None => log(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task Records
// ─────────────────────────────────────────────────────────────────────────────

struct QueuedTask<W: Workload> {
    id: TaskId,
    /// Arrival order, breaks priority ties
    seq: u64,
    priority: i32,
    request: W::Request,
    reply: Reply<W::Output>,
    cancel: CancelToken,
    progress: Option<ProgressCallback>,
    submitted: Instant,
    timer: Option<AbortHandle>,
}

impl<W: Workload> QueuedTask<W> {
    fn reject(self, error: PoolError) {
        settle_err(self.reply, &self.cancel, self.timer, error);
    }
}

// Max-heap: higher priority first, then lower sequence number.
impl<W: Workload> Ord for QueuedTask<W> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<W: Workload> PartialOrd for QueuedTask<W> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<W: Workload> PartialEq for QueuedTask<W> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<W: Workload> Eq for QueuedTask<W> {}

struct InFlightTask<W: Workload> {
    worker_id: WorkerId,
    task_type: &'static str,
    reply: Reply<W::Output>,
    cancel: CancelToken,
    submitted: Instant,
    timer: Option<AbortHandle>,
}

impl<W: Workload> InFlightTask<W> {
    fn reject(self, error: PoolError) {
        settle_err(self.reply, &self.cancel, self.timer, error);
    }
}

fn settle_err<T>(
    reply: Reply<T>,
    cancel: &CancelToken,
    timer: Option<AbortHandle>,
    error: PoolError,
) {
    cancel.cancel();
    if let Some(timer) = timer {
        timer.abort();
    }
    // Receiver may already be gone; nothing left to tell
    let _ = reply.send(Err(error));
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared State
// ─────────────────────────────────────────────────────────────────────────────

struct PoolState<W: Workload> {
    workers: BTreeMap<WorkerId, WorkerSlot<W>>,
    queue: BinaryHeap<QueuedTask<W>>,
    in_flight: HashMap<TaskId, InFlightTask<W>>,
    total: u64,
    completed: u64,
    failed: u64,
    durations: DurationWindow,
    next_worker_id: WorkerId,
    next_seq: u64,
    sweeper: Option<AbortHandle>,
    destroyed: bool,
}

impl<W: Workload> PoolState<W> {
    fn new() -> Self {
        Self {
            workers: BTreeMap::new(),
            queue: BinaryHeap::new(),
            in_flight: HashMap::new(),
            total: 0,
            completed: 0,
            failed: 0,
            durations: DurationWindow::default(),
            next_worker_id: 1,
            next_seq: 0,
            sweeper: None,
            destroyed: false,
        }
    }

    fn take_queued(&mut self, id: TaskId) -> Option<QueuedTask<W>> {
        let pos = self.queue.iter().position(|t| t.id == id)?;
        let mut tasks = mem::take(&mut self.queue).into_vec();
        let task = tasks.swap_remove(pos);
        self.queue = tasks.into();
        Some(task)
    }
}

pub(crate) struct PoolShared<W: Workload> {
    name: String,
    config: PoolConfig,
    workload: Arc<W>,
    logger: PoolLogger,
    runtime: Handle,
    next_task_id: AtomicU64,
    this: Weak<PoolShared<W>>,
    state: Mutex<PoolState<W>>,
}

impl<W: Workload> PoolShared<W> {
    fn lock_state(&self) -> MutexGuard<'_, PoolState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn destroyed_error(&self) -> PoolError {
        PoolError::Destroyed {
            pool: self.name.clone(),
        }
    }

    fn submit(
        &self,
        request: W::Request,
        priority: i32,
        progress: Option<ProgressCallback>,
    ) -> TaskHandle<W::Output> {
        let id = TaskId(self.next_task_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut state = self.lock_state();
        if state.destroyed {
            return TaskHandle::rejected(id, &self.name, self.destroyed_error());
        }

        let (reply, rx) = oneshot::channel();
        let task_type = self.workload.task_type(&request);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.total += 1;
        state.queue.push(QueuedTask {
            id,
            seq,
            priority,
            request,
            reply,
            cancel: CancelToken::new(),
            progress,
            submitted: Instant::now(),
            timer: self.arm_timeout(id),
        });

        let queued = state.queue.len();
        self.logger.emit(|| {
            debug!(pool = %self.name, task = %id, task_type, priority, queued, "Queued task")
        });

        self.pump(&mut state);
        TaskHandle::new(id, &self.name, rx)
    }

    fn arm_timeout(&self, id: TaskId) -> Option<AbortHandle> {
        let timeout = self.config.task_timeout()?;
        let pool = self.this.clone();
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = pool.upgrade() {
                shared.expire(id, timeout);
            }
        });
        Some(timer.abort_handle())
    }

    /// Dispatch queued tasks while workers are available.
    fn pump(&self, state: &mut PoolState<W>) {
        while !state.queue.is_empty() {
            let worker_id = match self.acquire_worker(state) {
                Ok(Some(id)) => id,
                Ok(None) => break,
                Err(source) => {
                    if let Some(task) = state.queue.pop() {
                        state.failed += 1;
                        self.logger.emit(|| {
                            error!(pool = %self.name, task = %task.id, error = %source, "Failed to spawn worker")
                        });
                        task.reject(PoolError::WorkerSpawn {
                            pool: self.name.clone(),
                            source,
                        });
                    }
                    continue;
                }
            };
            let Some(task) = state.queue.pop() else {
                break;
            };
            self.dispatch(state, worker_id, task);
        }
    }

    /// An idle worker, or a new one while under the cap.
    fn acquire_worker(&self, state: &mut PoolState<W>) -> io::Result<Option<WorkerId>> {
        if let Some(slot) = state.workers.values().find(|w| !w.busy) {
            return Ok(Some(slot.id));
        }
        if state.workers.len() >= self.config.worker_limit() {
            return Ok(None);
        }

        let id = state.next_worker_id;
        state.next_worker_id += 1;
        let slot = WorkerSlot::spawn(&self.name, id, Arc::clone(&self.workload), self.this.clone())?;
        state.workers.insert(id, slot);

        let workers = state.workers.len();
        self.logger
            .emit(|| debug!(pool = %self.name, worker = id, workers, "Created worker"));
        Ok(Some(id))
    }

    fn dispatch(&self, state: &mut PoolState<W>, worker_id: WorkerId, task: QueuedTask<W>) {
        let QueuedTask {
            id,
            request,
            reply,
            cancel,
            progress,
            submitted,
            timer,
            ..
        } = task;
        let task_type = self.workload.task_type(&request);
        let job = Job {
            task_id: id,
            request,
            ctx: TaskContext::new(cancel.clone(), progress),
        };

        let assigned = match state.workers.get_mut(&worker_id) {
            Some(slot) => slot.assign(job).is_ok(),
            None => false,
        };
        if !assigned {
            state.workers.remove(&worker_id);
            state.failed += 1;
            self.logger.emit(|| {
                error!(pool = %self.name, task = %id, worker = worker_id, "Worker exited before accepting task")
            });
            settle_err(
                reply,
                &cancel,
                timer,
                TaskError::Failed(format!("worker {worker_id} exited")).into(),
            );
            return;
        }

        state.in_flight.insert(
            id,
            InFlightTask {
                worker_id,
                task_type,
                reply,
                cancel,
                submitted,
                timer,
            },
        );
        self.logger.emit(|| {
            debug!(pool = %self.name, task = %id, task_type, worker = worker_id, "Started task")
        });
    }

    /// Called from a worker thread when an execution returns.
    pub(crate) fn finish(
        &self,
        worker_id: WorkerId,
        task_id: TaskId,
        outcome: Result<W::Output, TaskError>,
    ) {
        let mut state = self.lock_state();
        if let Some(slot) = state.workers.get_mut(&worker_id) {
            slot.release();
        }

        match state.in_flight.remove(&task_id) {
            Some(task) => {
                if let Some(timer) = &task.timer {
                    timer.abort();
                }
                let elapsed = task.submitted.elapsed();
                match outcome {
                    Ok(output) => {
                        state.completed += 1;
                        state.durations.record(elapsed);
                        self.logger.emit(|| {
                            info!(
                                pool = %self.name,
                                task_type = task.task_type,
                                worker = task.worker_id,
                                "Task {} completed in {}ms",
                                task_id,
                                elapsed.as_millis()
                            )
                        });
                        let _ = task.reply.send(Ok(output));
                    }
                    Err(err) => {
                        state.failed += 1;
                        self.logger.emit(|| {
                            error!(pool = %self.name, task = %task_id, task_type = task.task_type, error = %err, "Task failed")
                        });
                        let _ = task.reply.send(Err(err.into()));
                    }
                }
            }
            None => self.logger.emit(|| {
                debug!(pool = %self.name, task = %task_id, worker = worker_id, "Discarding result of settled task")
            }),
        }

        if !state.destroyed {
            self.pump(&mut state);
        }
    }

    fn expire(&self, task_id: TaskId, timeout: Duration) {
        let mut state = self.lock_state();
        let timed_out = PoolError::Timeout { task_id, timeout };

        if let Some(task) = state.in_flight.remove(&task_id) {
            state.failed += 1;
            self.logger.emit(|| {
                warn!(pool = %self.name, task = %task_id, worker = task.worker_id, ?timeout, "Task timed out while running")
            });
            task.reject(timed_out);
        } else if let Some(task) = state.take_queued(task_id) {
            state.failed += 1;
            self.logger.emit(|| {
                warn!(pool = %self.name, task = %task_id, ?timeout, "Task timed out in queue")
            });
            task.reject(timed_out);
        }
    }

    fn reap_idle(&self) -> usize {
        let mut state = self.lock_state();
        if state.destroyed {
            return 0;
        }
        let idle_timeout = self.config.idle_timeout();
        let stale: Vec<WorkerId> = state
            .workers
            .values()
            .filter(|w| !w.busy && w.last_used.elapsed() > idle_timeout)
            .map(|w| w.id)
            .collect();

        for id in &stale {
            if let Some(slot) = state.workers.remove(id) {
                self.logger.emit(|| {
                    debug!(pool = %self.name, worker = slot.id, tasks_run = slot.tasks_run, "Cleaned up idle worker")
                });
            }
        }
        stale.len()
    }

    fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        PoolStats {
            total_tasks: state.total,
            completed_tasks: state.completed,
            failed_tasks: state.failed,
            active_workers: state.workers.len(),
            busy_workers: state.workers.values().filter(|w| w.busy).count(),
            queue_size: state.queue.len(),
            pending_tasks: (state.queue.len() + state.in_flight.len()) as u64,
            average_task_time_ms: state.durations.average_ms(),
        }
    }

    fn destroy(&self) {
        let mut state = self.lock_state();
        if state.destroyed {
            return;
        }
        state.destroyed = true;

        if let Some(sweeper) = state.sweeper.take() {
            sweeper.abort();
        }

        let queued = mem::take(&mut state.queue).into_vec();
        let in_flight: Vec<_> = state.in_flight.drain().map(|(_, task)| task).collect();
        let rejected = queued.len() + in_flight.len();
        state.failed += rejected as u64;
        for task in queued {
            task.reject(self.destroyed_error());
        }
        for task in in_flight {
            task.reject(self.destroyed_error());
        }

        for slot in state.workers.values() {
            if let Some(task) = slot.current_task {
                self.logger.emit(|| {
                    debug!(pool = %self.name, worker = slot.id, task = %task, "Abandoning running task")
                });
            }
        }
        // Dropping the slots closes each worker's job channel
        let workers = state.workers.len();
        state.workers.clear();

        self.logger
            .emit(|| info!(pool = %self.name, workers, rejected, "Worker pool destroyed"));
    }
}

async fn sweep_idle_workers<W: Workload>(pool: Weak<PoolShared<W>>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(shared) = pool.upgrade() else {
            break;
        };
        shared.reap_idle();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public Pool
// ─────────────────────────────────────────────────────────────────────────────

/// Bounded pool of worker threads fed from a priority queue.
///
/// Must be created inside a tokio runtime: task deadlines and the idle sweep
/// run as tasks on it. Dropping the pool destroys it.
pub struct WorkerPool<W: Workload> {
    shared: Arc<PoolShared<W>>,
}

impl<W: Workload> WorkerPool<W> {
    pub fn new(name: impl Into<String>, config: PoolConfig, workload: W) -> Result<Self, PoolError> {
        Self::build(name.into(), config, Arc::new(workload), None)
    }

    /// Like [`WorkerPool::new`], routing pool logs to `dispatch`.
    pub fn with_logger(
        name: impl Into<String>,
        config: PoolConfig,
        workload: W,
        dispatch: Dispatch,
    ) -> Result<Self, PoolError> {
        Self::build(name.into(), config, Arc::new(workload), Some(dispatch))
    }

    pub(crate) fn build(
        name: String,
        config: PoolConfig,
        workload: Arc<W>,
        dispatch: Option<Dispatch>,
    ) -> Result<Self, PoolError> {
        let runtime = Handle::try_current().map_err(PoolError::NoRuntime)?;
        let cleanup_interval = config.cleanup_interval();
        let logger = PoolLogger {
            enabled: config.enable_logging,
            dispatch,
        };

        let shared = Arc::new_cyclic(|this| PoolShared {
            name,
            config,
            workload,
            logger,
            runtime: runtime.clone(),
            next_task_id: AtomicU64::new(0),
            this: this.clone(),
            state: Mutex::new(PoolState::new()),
        });

        let sweeper = runtime.spawn(sweep_idle_workers(Arc::downgrade(&shared), cleanup_interval));
        shared.lock_state().sweeper = Some(sweeper.abort_handle());

        shared.logger.emit(|| {
            info!(
                pool = %shared.name,
                max_workers = shared.config.worker_limit(),
                task_timeout_ms = shared.config.task_timeout_ms,
                "Worker pool initialized"
            )
        });

        Ok(Self { shared })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn has_logger(&self) -> bool {
        self.shared.logger.dispatch.is_some()
    }

    /// Queue a task. Higher `priority` runs first; equal priorities run in
    /// submission order. After [`destroy`](Self::destroy) the returned handle
    /// resolves to [`PoolError::Destroyed`] immediately.
    pub fn execute(
        &self,
        request: W::Request,
        priority: i32,
        on_progress: Option<ProgressCallback>,
    ) -> TaskHandle<W::Output> {
        self.shared.submit(request, priority, on_progress)
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// Terminate workers idle past `idle_timeout`. Runs periodically on its
    /// own; returns how many were reclaimed.
    pub fn reap_idle_workers(&self) -> usize {
        self.shared.reap_idle()
    }

    /// Stop all workers and reject every queued and in-flight task.
    /// Safe to call more than once.
    pub fn destroy(&self) {
        self.shared.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.lock_state().destroyed
    }
}

impl<W: Workload> Drop for WorkerPool<W> {
    fn drop(&mut self) {
        self.shared.destroy();
    }
}
