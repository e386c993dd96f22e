//! Task kinds runnable on a worker pool
//!
//! The set of kinds is closed: a request is a [`TaskRequest`] variant and
//! dispatch is an exhaustive `match`. The only place an arbitrary task name
//! can appear is [`TaskRequest::from_named`], which decodes string-keyed
//! messages (e.g. from a UI bridge) and rejects unknown names there.

mod context;
mod error;

pub use context::{CancelToken, ProgressCallback, TaskContext};
pub use error::TaskError;

use crate::buffs::{BuffLookup, BuffLookupTask};
use crate::pool::Workload;
use crate::timeline::{self, ActorPositionsTask, ActorPositionsTimeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    ActorPositions,
    BuffLookup,
}

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::ActorPositions, TaskKind::BuffLookup];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::ActorPositions => "actor_positions",
            TaskKind::BuffLookup => "buff_lookup",
        }
    }

    /// Accepts the snake_case names and the camelCase message names used by
    /// the web client.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "actor_positions" | "calculateActorPositions" => Some(TaskKind::ActorPositions),
            "buff_lookup" | "createBuffLookup" => Some(TaskKind::BuffLookup),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TaskRequest {
    ActorPositions(Box<ActorPositionsTask>),
    BuffLookup(BuffLookupTask),
}

impl TaskRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::ActorPositions(_) => TaskKind::ActorPositions,
            TaskRequest::BuffLookup(_) => TaskKind::BuffLookup,
        }
    }

    /// Decode a `(task type, JSON payload)` message into a typed request.
    pub fn from_named(task_type: &str, data: serde_json::Value) -> Result<Self, TaskError> {
        let kind = TaskKind::from_name(task_type).ok_or_else(|| TaskError::UnknownTaskType {
            name: task_type.to_string(),
        })?;
        let invalid = |source| TaskError::InvalidPayload {
            task_type: kind.name(),
            source,
        };

        Ok(match kind {
            TaskKind::ActorPositions => {
                TaskRequest::ActorPositions(Box::new(serde_json::from_value(data).map_err(invalid)?))
            }
            TaskKind::BuffLookup => {
                TaskRequest::BuffLookup(serde_json::from_value(data).map_err(invalid)?)
            }
        })
    }
}

impl From<ActorPositionsTask> for TaskRequest {
    fn from(task: ActorPositionsTask) -> Self {
        TaskRequest::ActorPositions(Box::new(task))
    }
}

impl From<BuffLookupTask> for TaskRequest {
    fn from(task: BuffLookupTask) -> Self {
        TaskRequest::BuffLookup(task)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    ActorPositions(ActorPositionsTimeline),
    BuffLookup(BuffLookup),
}

impl TaskOutput {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskOutput::ActorPositions(_) => TaskKind::ActorPositions,
            TaskOutput::BuffLookup(_) => TaskKind::BuffLookup,
        }
    }

    pub fn into_actor_positions(self) -> Option<ActorPositionsTimeline> {
        match self {
            TaskOutput::ActorPositions(timeline) => Some(timeline),
            _ => None,
        }
    }

    pub fn into_buff_lookup(self) -> Option<BuffLookup> {
        match self {
            TaskOutput::BuffLookup(lookup) => Some(lookup),
            _ => None,
        }
    }
}

/// Execute a request on the current thread.
pub fn run(request: TaskRequest, ctx: &TaskContext) -> Result<TaskOutput, TaskError> {
    ctx.checkpoint()?;
    match request {
        TaskRequest::ActorPositions(task) => {
            timeline::reconstruct(&task, ctx).map(TaskOutput::ActorPositions)
        }
        TaskRequest::BuffLookup(task) => {
            let lookup = BuffLookup::from_events(&task.events, task.fight_end_time);
            ctx.report(1.0);
            Ok(TaskOutput::BuffLookup(lookup))
        }
    }
}

/// The combat replay workload: every [`TaskKind`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatWorkload;

impl Workload for CombatWorkload {
    type Request = TaskRequest;
    type Output = TaskOutput;

    fn task_type(&self, request: &TaskRequest) -> &'static str {
        request.kind().name()
    }

    fn execute(&self, request: TaskRequest, ctx: &TaskContext) -> Result<TaskOutput, TaskError> {
        run(request, ctx)
    }
}
