use std::time::Duration;

use serde::Serialize;

/// Snapshot of a pool's counters.
///
/// `total_tasks == completed_tasks + failed_tasks + pending_tasks` holds for
/// every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolStats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    /// Live worker threads, busy or idle
    pub active_workers: usize,
    pub busy_workers: usize,
    pub queue_size: usize,
    /// Queued plus in-flight
    pub pending_tasks: u64,
    /// Mean of the most recent completed task durations
    pub average_task_time_ms: f64,
}

impl PoolStats {
    /// Fold another pool's snapshot into this one. Averages are weighted by
    /// completed task counts.
    pub fn merge(&mut self, other: &PoolStats) {
        let completed = self.completed_tasks + other.completed_tasks;
        self.average_task_time_ms = if completed == 0 {
            0.0
        } else {
            (self.average_task_time_ms * self.completed_tasks as f64
                + other.average_task_time_ms * other.completed_tasks as f64)
                / completed as f64
        };
        self.total_tasks += other.total_tasks;
        self.completed_tasks = completed;
        self.failed_tasks += other.failed_tasks;
        self.active_workers += other.active_workers;
        self.busy_workers += other.busy_workers;
        self.queue_size += other.queue_size;
        self.pending_tasks += other.pending_tasks;
    }
}

const WINDOW_MAX: usize = 100;
const WINDOW_KEEP: usize = 50;

/// Bounded window of recent task durations.
///
/// Once it holds more than 100 entries it is cut back to the newest 50.
#[derive(Debug, Default)]
pub(crate) struct DurationWindow {
    samples: Vec<Duration>,
}

impl DurationWindow {
    pub fn record(&mut self, elapsed: Duration) {
        self.samples.push(elapsed);
        if self.samples.len() > WINDOW_MAX {
            let excess = self.samples.len() - WINDOW_KEEP;
            self.samples.drain(..excess);
        }
    }

    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: Duration = self.samples.iter().sum();
        total.as_secs_f64() * 1000.0 / self.samples.len() as f64
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }
}
