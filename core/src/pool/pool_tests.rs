//! Tests for WorkerPool scheduling and lifecycle
//!
//! A recording workload records concurrency and execution order so scheduling
//! decisions can be asserted without relying on real combat tasks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use fightline_types::PoolConfig;

use super::{PoolError, PoolStats, WorkerPool, Workload};
use crate::tasks::{TaskContext, TaskError};

#[derive(Default)]
struct Recorder {
    running: AtomicUsize,
    peak: AtomicUsize,
    order: Mutex<Vec<&'static str>>,
    observed_cancel: AtomicBool,
}

#[derive(Clone, Default)]
struct RecordingWorkload(Arc<Recorder>);

enum TestTask {
    Sleep { label: &'static str, ms: u64 },
    Fail,
    Panic,
    Progress(Vec<f32>),
    SpinUntilCancelled,
}

impl Workload for RecordingWorkload {
    type Request = TestTask;
    type Output = String;

    fn task_type(&self, request: &TestTask) -> &'static str {
        match request {
            TestTask::Sleep { .. } => "sleep",
            TestTask::Fail => "fail",
            TestTask::Panic => "panic",
            TestTask::Progress(_) => "progress",
            TestTask::SpinUntilCancelled => "spin",
        }
    }

    fn execute(&self, request: TestTask, ctx: &TaskContext) -> Result<String, TaskError> {
        let recorder = &self.0;
        match request {
            TestTask::Sleep { label, ms } => {
                let now = recorder.running.fetch_add(1, Ordering::SeqCst) + 1;
                recorder.peak.fetch_max(now, Ordering::SeqCst);
                recorder.order.lock().unwrap().push(label);
                thread::sleep(Duration::from_millis(ms));
                recorder.running.fetch_sub(1, Ordering::SeqCst);
                Ok(label.to_string())
            }
            TestTask::Fail => Err(TaskError::Failed("boom".to_string())),
            TestTask::Panic => panic!("task panic"),
            TestTask::Progress(steps) => {
                for step in steps {
                    ctx.report(step);
                }
                Ok("progress".to_string())
            }
            TestTask::SpinUntilCancelled => {
                for _ in 0..400 {
                    if ctx.is_cancelled() {
                        recorder.observed_cancel.store(true, Ordering::SeqCst);
                        return Err(TaskError::Cancelled);
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Ok("spun".to_string())
            }
        }
    }
}

fn config(max_workers: usize, task_timeout_ms: u64) -> PoolConfig {
    PoolConfig {
        max_workers,
        task_timeout_ms,
        ..Default::default()
    }
}

fn make_pool(max_workers: usize) -> (WorkerPool<RecordingWorkload>, Arc<Recorder>) {
    let workload = RecordingWorkload::default();
    let recorder = Arc::clone(&workload.0);
    let pool = WorkerPool::new("recording", config(max_workers, 0), workload).unwrap();
    (pool, recorder)
}

fn sleep_task(label: &'static str, ms: u64) -> TestTask {
    TestTask::Sleep { label, ms }
}

fn assert_balanced(stats: &PoolStats) {
    assert_eq!(
        stats.total_tasks,
        stats.completed_tasks + stats.failed_tasks + stats.pending_tasks,
        "unbalanced stats: {stats:?}"
    );
}

#[test]
fn test_pool_requires_runtime() {
    let result = WorkerPool::new("orphan", PoolConfig::default(), RecordingWorkload::default());
    assert!(matches!(result, Err(PoolError::NoRuntime(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_execute_resolves_with_output() {
    let (pool, _recorder) = make_pool(2);
    assert_eq!(pool.stats(), PoolStats::default());

    let output = pool.execute(sleep_task("a", 10), 0, None).await.unwrap();
    assert_eq!(output, "a");

    let stats = pool.stats();
    assert_eq!(stats.total_tasks, 1);
    assert_eq!(stats.completed_tasks, 1);
    assert_eq!(stats.failed_tasks, 0);
    assert_eq!(stats.queue_size, 0);
    assert_eq!(stats.active_workers, 1);
    assert!(stats.average_task_time_ms > 0.0);
    assert_balanced(&stats);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrency_never_exceeds_max_workers() {
    let (pool, recorder) = make_pool(3);

    let handles: Vec<_> = (0..9)
        .map(|_| pool.execute(sleep_task("job", 40), 0, None))
        .collect();

    let stats = pool.stats();
    assert_eq!(stats.active_workers, 3);
    assert_eq!(stats.queue_size, 6);
    assert_balanced(&stats);

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(recorder.peak.load(Ordering::SeqCst) <= 3);
    let stats = pool.stats();
    assert_eq!(stats.completed_tasks, 9);
    assert_eq!(stats.active_workers, 3);
    assert_balanced(&stats);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_higher_priority_dispatches_first() {
    let (pool, recorder) = make_pool(1);

    // Occupies the only worker while the rest queue up
    let blocker = pool.execute(sleep_task("blocker", 100), 0, None);
    let low = pool.execute(sleep_task("low", 1), 1, None);
    let mid = pool.execute(sleep_task("mid", 1), 5, None);
    let high = pool.execute(sleep_task("high", 1), 10, None);
    let high_later = pool.execute(sleep_task("high-later", 1), 10, None);

    for handle in [blocker, low, mid, high, high_later] {
        handle.await.unwrap();
    }

    assert_eq!(
        *recorder.order.lock().unwrap(),
        vec!["blocker", "high", "high-later", "mid", "low"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_task_failure_is_isolated() {
    let (pool, _recorder) = make_pool(1);

    let failed = pool.execute(TestTask::Fail, 0, None);
    let ok = pool.execute(sleep_task("after", 1), 0, None);

    assert!(matches!(failed.await, Err(PoolError::Task(TaskError::Failed(_)))));
    assert_eq!(ok.await.unwrap(), "after");

    let stats = pool.stats();
    assert_eq!(stats.failed_tasks, 1);
    assert_eq!(stats.completed_tasks, 1);
    assert_balanced(&stats);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panic_becomes_task_error() {
    let (pool, _recorder) = make_pool(1);

    let result = pool.execute(TestTask::Panic, 0, None).await;
    match result {
        Err(PoolError::Task(TaskError::Panicked { task_type, message })) => {
            assert_eq!(task_type, "panic");
            assert_eq!(message, "task panic");
        }
        other => panic!("expected panic error, got {other:?}"),
    }

    // Same worker keeps serving
    assert_eq!(pool.execute(sleep_task("next", 1), 0, None).await.unwrap(), "next");
    assert_eq!(pool.stats().active_workers, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_progress_forwarded_to_caller() {
    let (pool, _recorder) = make_pool(1);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    pool.execute(
        TestTask::Progress(vec![0.25, 0.5, 1.0]),
        0,
        Some(Arc::new(move |p| sink.lock().unwrap().push(p))),
    )
    .await
    .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5, 1.0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_trips_cancellation() {
    let workload = RecordingWorkload::default();
    let recorder = Arc::clone(&workload.0);
    let pool = WorkerPool::new("recording", config(1, 50), workload).unwrap();

    let result = pool.execute(TestTask::SpinUntilCancelled, 0, None).await;
    assert!(matches!(result, Err(ref e) if e.is_timeout()), "{result:?}");

    for _ in 0..100 {
        if recorder.observed_cancel.load(Ordering::SeqCst) && pool.stats().busy_workers == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(recorder.observed_cancel.load(Ordering::SeqCst));

    // The late Cancelled result is discarded, not counted twice
    let stats = pool.stats();
    assert_eq!(stats.busy_workers, 0);
    assert_eq!(stats.failed_tasks, 1);
    assert_eq!(stats.completed_tasks, 0);
    assert_balanced(&stats);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_covers_queued_tasks() {
    let workload = RecordingWorkload::default();
    let pool = WorkerPool::new("recording", config(1, 50), workload).unwrap();

    let running = pool.execute(sleep_task("slow", 200), 0, None);
    let queued = pool.execute(sleep_task("never", 1), 0, None);

    assert!(queued.await.unwrap_err().is_timeout());
    assert!(running.await.unwrap_err().is_timeout());

    let stats = pool.stats();
    assert_eq!(stats.failed_tasks, 2);
    assert_eq!(stats.queue_size, 0);
    assert_eq!(stats.pending_tasks, 0);
    assert_balanced(&stats);

    // Worker stays occupied until the slow execution returns
    tokio::time::sleep(Duration::from_millis(250)).await;
    let stats = pool.stats();
    assert_eq!(stats.busy_workers, 0);
    assert_eq!(stats.completed_tasks, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_destroy_rejects_pending_and_is_idempotent() {
    let (pool, _recorder) = make_pool(1);

    let running = pool.execute(sleep_task("running", 100), 0, None);
    let queued = pool.execute(sleep_task("queued", 1), 0, None);

    pool.destroy();
    pool.destroy();
    assert!(pool.is_destroyed());

    assert!(running.await.unwrap_err().is_destroyed());
    assert!(queued.await.unwrap_err().is_destroyed());

    let stats = pool.stats();
    assert_eq!(stats.active_workers, 0);
    assert_eq!(stats.failed_tasks, 2);
    assert_eq!(stats.queue_size, 0);
    assert_balanced(&stats);

    let late = pool.execute(sleep_task("late", 1), 0, None);
    assert!(late.await.unwrap_err().is_destroyed());
    assert_eq!(pool.stats().total_tasks, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drop_rejects_pending() {
    let (pool, _recorder) = make_pool(1);
    let handle = pool.execute(sleep_task("running", 100), 0, None);
    drop(pool);
    assert!(handle.await.unwrap_err().is_destroyed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_idle_workers_reclaimed() {
    let workload = RecordingWorkload::default();
    let pool = WorkerPool::new(
        "recording",
        PoolConfig {
            max_workers: 2,
            idle_timeout_ms: 20,
            task_timeout_ms: 0,
            ..Default::default()
        },
        workload,
    )
    .unwrap();

    pool.execute(sleep_task("a", 1), 0, None).await.unwrap();
    assert_eq!(pool.stats().active_workers, 1);
    assert_eq!(pool.reap_idle_workers(), 0);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(pool.reap_idle_workers(), 1);
    assert_eq!(pool.stats().active_workers, 0);

    // A fresh worker is spawned on demand
    assert_eq!(pool.execute(sleep_task("b", 1), 0, None).await.unwrap(), "b");
    assert_eq!(pool.stats().active_workers, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sweeper_reclaims_idle_workers_on_its_own() {
    let pool = WorkerPool::new(
        "sweeper",
        PoolConfig {
            max_workers: 1,
            idle_timeout_ms: 10,
            cleanup_interval_ms: 20,
            task_timeout_ms: 0,
            ..Default::default()
        },
        RecordingWorkload::default(),
    )
    .unwrap();

    pool.execute(sleep_task("a", 1), 0, None).await.unwrap();
    assert_eq!(pool.stats().active_workers, 1);

    let mut reclaimed = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if pool.stats().active_workers == 0 {
            reclaimed = true;
            break;
        }
    }
    assert!(reclaimed, "idle worker still alive after sweeps");

    assert_eq!(pool.execute(sleep_task("b", 1), 0, None).await.unwrap(), "b");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_busy_workers_survive_reaping() {
    let workload = RecordingWorkload::default();
    let pool = WorkerPool::new(
        "recording",
        PoolConfig {
            max_workers: 1,
            idle_timeout_ms: 0,
            task_timeout_ms: 0,
            ..Default::default()
        },
        workload,
    )
    .unwrap();

    let handle = pool.execute(sleep_task("busy", 80), 0, None);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.reap_idle_workers(), 0);
    assert_eq!(handle.await.unwrap(), "busy");
}
