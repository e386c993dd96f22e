pub mod buffs;
pub mod context;
pub mod phases;
pub mod pool;
pub mod tasks;
pub mod timeline;

// Re-exports for convenience
pub use buffs::{BuffInterval, BuffLookup, BuffLookupTask, TAUNT_ABILITY_ID};
pub use context::{ConfigError, PoolConfig, ReplayConfig, ReplayConfigExt};
pub use phases::{BoundarySource, MapTimeline, MapTimelineEntry};
pub use pool::{
    DEFAULT_POOL, PoolError, PoolRegistry, PoolStats, TaskHandle, TaskId, WorkerPool, Workload,
};
pub use tasks::{
    CancelToken, CombatWorkload, TaskContext, TaskError, TaskKind, TaskOutput, TaskRequest,
};
pub use timeline::{
    ActorFrame, ActorPositionsTask, ActorPositionsTimeline, ActorSample, ActorTimeline,
    ActorTrack, reconstruct,
};
