//! Worker threads
//!
//! Each worker is a named OS thread that owns nothing but its job receiver and
//! a weak reference back to the pool. Closing the sender ends the thread after
//! its current job.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;

use crate::tasks::{TaskContext, TaskError};

use super::worker_pool::PoolShared;
use super::{TaskId, Workload};

pub(crate) type WorkerId = u64;

pub(crate) struct Job<W: Workload> {
    pub task_id: TaskId,
    pub request: W::Request,
    pub ctx: TaskContext,
}

/// Pool-side bookkeeping for one worker thread
pub(crate) struct WorkerSlot<W: Workload> {
    pub id: WorkerId,
    jobs: Sender<Job<W>>,
    pub busy: bool,
    pub current_task: Option<TaskId>,
    pub last_used: Instant,
    pub tasks_run: u64,
}

impl<W: Workload> WorkerSlot<W> {
    pub fn spawn(
        pool_name: &str,
        id: WorkerId,
        workload: Arc<W>,
        pool: Weak<PoolShared<W>>,
    ) -> io::Result<Self> {
        let (jobs, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("{pool_name}-worker-{id}"))
            .spawn(move || run_worker(id, rx, workload, pool))?;

        Ok(Self {
            id,
            jobs,
            busy: false,
            current_task: None,
            last_used: Instant::now(),
            tasks_run: 0,
        })
    }

    /// Hand a job to the thread. Gives the job back if the thread is gone.
    pub fn assign(&mut self, job: Job<W>) -> Result<(), Job<W>> {
        let task_id = job.task_id;
        self.jobs.send(job).map_err(|e| e.0)?;
        self.busy = true;
        self.current_task = Some(task_id);
        self.last_used = Instant::now();
        Ok(())
    }

    pub fn release(&mut self) {
        self.busy = false;
        self.current_task = None;
        self.last_used = Instant::now();
        self.tasks_run += 1;
    }
}

fn run_worker<W: Workload>(
    worker_id: WorkerId,
    jobs: Receiver<Job<W>>,
    workload: Arc<W>,
    pool: Weak<PoolShared<W>>,
) {
    while let Ok(Job { task_id, request, ctx }) = jobs.recv() {
        let task_type = workload.task_type(&request);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| workload.execute(request, &ctx)))
            .unwrap_or_else(|payload| {
                Err(TaskError::Panicked {
                    task_type: task_type.to_string(),
                    message: panic_message(payload.as_ref()),
                })
            });

        match pool.upgrade() {
            Some(shared) => shared.finish(worker_id, task_id, outcome),
            None => break,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
