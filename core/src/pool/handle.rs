use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::PoolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

pub(crate) type Reply<T> = oneshot::Sender<Result<T, PoolError>>;

/// Pending result of a submitted task.
///
/// The task is already queued when the handle is returned; awaiting it only
/// waits for the outcome. Dropping the handle does not cancel the task.
#[must_use = "the task runs regardless, but its result is lost if the handle is dropped"]
pub struct TaskHandle<T> {
    id: TaskId,
    pool: String,
    rx: oneshot::Receiver<Result<T, PoolError>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(id: TaskId, pool: &str, rx: oneshot::Receiver<Result<T, PoolError>>) -> Self {
        Self {
            id,
            pool: pool.to_string(),
            rx,
        }
    }

    /// A handle that resolves immediately with `error`.
    pub(crate) fn rejected(id: TaskId, pool: &str, error: PoolError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self::new(id, pool, rx)
    }

    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, PoolError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped without an answer: the pool went away
            Poll::Ready(Err(_)) => Poll::Ready(Err(PoolError::Destroyed {
                pool: this.pool.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("pool", &self.pool)
            .finish()
    }
}
