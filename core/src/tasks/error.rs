//! Error types for task execution

use thiserror::Error;

/// Failure of a single task. Never affects other tasks in the pool.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("unknown task type '{name}'")]
    UnknownTaskType { name: String },

    #[error("invalid payload for task '{task_type}'")]
    InvalidPayload {
        task_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("task was cancelled")]
    Cancelled,

    #[error("task failed: {0}")]
    Failed(String),

    #[error("task '{task_type}' panicked: {message}")]
    Panicked { task_type: String, message: String },
}
