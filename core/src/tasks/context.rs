use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::TaskError;

/// Progress sink, called with a fraction in `0.0..=1.0`.
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Shared cancellation flag. Tripped by the pool on timeout or shutdown.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Per-execution handle given to a running task.
///
/// Carries the cancellation flag and the optional progress sink. Progress is
/// dropped once the task has been cancelled so a timed-out task can no longer
/// reach the caller.
#[derive(Clone, Default)]
pub struct TaskContext {
    cancel: CancelToken,
    progress: Option<ProgressCallback>,
}

impl TaskContext {
    pub fn new(cancel: CancelToken, progress: Option<ProgressCallback>) -> Self {
        Self { cancel, progress }
    }

    /// Context for running a task inline, outside any pool.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_progress(progress: ProgressCallback) -> Self {
        Self {
            cancel: CancelToken::new(),
            progress: Some(progress),
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns `Err(Cancelled)` once the token has been tripped.
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn report(&self, fraction: f32) {
        if self.is_cancelled() {
            return;
        }
        if let Some(progress) = &self.progress {
            progress(fraction.clamp(0.0, 1.0));
        }
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("cancelled", &self.is_cancelled())
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}
