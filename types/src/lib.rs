//! Shared fight and configuration types for fightline
//!
//! This crate contains the serializable shapes that cross crate and process
//! boundaries: fight metadata, raw combat events, roster data, buff events and
//! the worker pool / replay configuration. Field names follow the upstream
//! combat-log API (camelCase, `sourceID`, `abilityGameID`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Actor identifier, scoped to a single fight.
pub type ActorId = i64;

// ─────────────────────────────────────────────────────────────────────────────
// Fight Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// One bounded combat encounter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fight {
    pub id: i64,
    /// Absolute start, milliseconds
    pub start_time: i64,
    /// Absolute end, milliseconds
    pub end_time: i64,
    #[serde(default)]
    pub friendly_players: Vec<ActorId>,
    #[serde(default, rename = "friendlyNPCs")]
    pub friendly_npcs: Vec<FightNpc>,
    #[serde(default, rename = "enemyNPCs")]
    pub enemy_npcs: Vec<FightNpc>,
    /// Maps visited during the fight, in order. Unknown maps are `null`.
    #[serde(default)]
    pub maps: Vec<Option<FightMap>>,
    #[serde(default)]
    pub phase_transitions: Vec<PhaseTransition>,
}

impl Fight {
    pub fn duration(&self) -> i64 {
        self.end_time - self.start_time
    }

    pub fn is_friendly_player(&self, id: ActorId) -> bool {
        self.friendly_players.contains(&id)
    }

    pub fn is_friendly_npc(&self, id: ActorId) -> bool {
        self.friendly_npcs.iter().any(|npc| npc.id == id)
    }

    pub fn is_enemy_npc(&self, id: ActorId) -> bool {
        self.enemy_npcs.iter().any(|npc| npc.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FightNpc {
    pub id: ActorId,
    #[serde(default, rename = "gameID")]
    pub game_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FightMap {
    pub id: i64,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Explicit phase boundary reported by the log source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTransition {
    pub id: i64,
    pub start_time: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Combat Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Damage,
    Heal,
    Death,
    ResourceChange,
}

/// Point-in-time snapshot of an actor attached to an event.
///
/// Coordinates and facing are raw integer game units; every field may be
/// missing on any given event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default)]
    pub facing: Option<i32>,
    #[serde(default)]
    pub hit_points: Option<i64>,
    #[serde(default)]
    pub max_hit_points: Option<i64>,
}

impl Resources {
    /// `(x, y, facing)` when all three are present.
    pub fn position(&self) -> Option<(i32, i32, i32)> {
        Some((self.x?, self.y?, self.facing?))
    }

    /// `(current, max)` when both are present and max is positive.
    pub fn health(&self) -> Option<(i64, i64)> {
        match (self.hit_points, self.max_hit_points) {
            (Some(hp), Some(max)) if max > 0 => Some((hp, max)),
            _ => None,
        }
    }
}

/// A single timestamped combat log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Absolute time, milliseconds
    pub timestamp: i64,
    #[serde(rename = "sourceID")]
    pub source_id: ActorId,
    #[serde(default, rename = "targetID")]
    pub target_id: Option<ActorId>,
    #[serde(default)]
    pub source_resources: Option<Resources>,
    #[serde(default)]
    pub target_resources: Option<Resources>,
    #[serde(default, rename = "abilityGameID")]
    pub ability_game_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<i64>,
}

impl CombatEvent {
    pub fn new(kind: EventKind, timestamp: i64, source_id: ActorId) -> Self {
        Self {
            kind,
            timestamp,
            source_id,
            target_id: None,
            source_resources: None,
            target_resources: None,
            ability_game_id: None,
            amount: None,
        }
    }

    pub fn with_target(mut self, target_id: ActorId) -> Self {
        self.target_id = Some(target_id);
        self
    }

    pub fn with_source_resources(mut self, resources: Resources) -> Self {
        self.source_resources = Some(resources);
        self
    }

    pub fn with_target_resources(mut self, resources: Resources) -> Self {
        self.target_resources = Some(resources);
        self
    }
}

/// All events of one fight, grouped by kind as the log API returns them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FightEvents {
    #[serde(default)]
    pub damage: Vec<CombatEvent>,
    #[serde(default)]
    pub heal: Vec<CombatEvent>,
    #[serde(default)]
    pub death: Vec<CombatEvent>,
    #[serde(default)]
    pub resource: Vec<CombatEvent>,
}

impl FightEvents {
    pub fn len(&self) -> usize {
        self.damage.len() + self.heal.len() + self.death.len() + self.resource.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &CombatEvent> {
        self.damage
            .iter()
            .chain(&self.heal)
            .chain(&self.death)
            .chain(&self.resource)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Buff Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuffEventKind {
    ApplyBuff,
    ApplyBuffStack,
    RemoveBuff,
    RemoveBuffStack,
    ApplyDebuff,
    ApplyDebuffStack,
    RemoveDebuff,
    RemoveDebuffStack,
}

impl BuffEventKind {
    /// Opens an interval if none is open for the (ability, target) pair.
    pub fn is_apply(&self) -> bool {
        matches!(
            self,
            Self::ApplyBuff | Self::ApplyBuffStack | Self::ApplyDebuff | Self::ApplyDebuffStack
        )
    }

    /// Closes the open interval. Stack removal never does.
    pub fn is_remove(&self) -> bool {
        matches!(self, Self::RemoveBuff | Self::RemoveDebuff)
    }

    /// Initial application (not a stack change).
    pub fn is_initial_apply(&self) -> bool {
        matches!(self, Self::ApplyBuff | Self::ApplyDebuff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffEvent {
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: BuffEventKind,
    #[serde(rename = "abilityGameID")]
    pub ability_game_id: i64,
    #[serde(rename = "sourceID")]
    pub source_id: ActorId,
    #[serde(rename = "targetID")]
    pub target_id: ActorId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Actors
// ─────────────────────────────────────────────────────────────────────────────

/// Rendering category of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Player,
    Enemy,
    Boss,
    FriendlyNpc,
}

impl ActorKind {
    /// Enemies and bosses can be taunted
    pub fn is_hostile(&self) -> bool {
        matches!(self, Self::Enemy | Self::Boss)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Dps,
    Tank,
    Healer,
}

/// Player roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Report-level actor metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorMeta {
    #[serde(default)]
    pub name: Option<String>,
    /// "Player", "NPC", "Pet"
    #[serde(default, rename = "type")]
    pub actor_type: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
}

impl ActorMeta {
    pub fn is_boss(&self) -> bool {
        self.actor_type.as_deref() == Some("NPC") && self.sub_type.as_deref() == Some("Boss")
    }
}

/// Health at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub current: f64,
    pub max: f64,
}

impl HealthSnapshot {
    pub fn percent(&self) -> f64 {
        if self.max <= 0.0 {
            0.0
        } else {
            self.current / self.max * 100.0
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serde Default Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn default_max_workers() -> usize {
    4
}
fn default_idle_timeout_ms() -> u64 {
    300_000
}
fn default_task_timeout_ms() -> u64 {
    30_000
}
fn default_cleanup_interval_ms() -> u64 {
    60_000
}
fn default_sample_interval_ms() -> i64 {
    100
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker Pool Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a single worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Upper bound on concurrently running workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Idle workers older than this are reclaimed
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Per-task deadline, measured from submission. 0 disables it.
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    /// How often the idle sweep runs
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    #[serde(default)]
    pub enable_logging: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            idle_timeout_ms: default_idle_timeout_ms(),
            task_timeout_ms: default_task_timeout_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            enable_logging: false,
        }
    }
}

impl PoolConfig {
    /// Worker cap, never below one
    pub fn worker_limit(&self) -> usize {
        self.max_workers.max(1)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_ms > 0).then(|| Duration::from_millis(self.task_timeout_ms))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms.max(1))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Replay Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Grid step of the position timeline
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: i64,
    /// Used for any pool without its own entry
    #[serde(default)]
    pub default_pool: PoolConfig,
    /// Per-pool overrides keyed by pool name
    #[serde(default)]
    pub pools: HashMap<String, PoolConfig>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            default_pool: PoolConfig::default(),
            pools: HashMap::new(),
        }
    }
}

impl ReplayConfig {
    /// Config for the named pool, falling back to `default_pool`
    pub fn pool(&self, name: &str) -> &PoolConfig {
        self.pools.get(name).unwrap_or(&self.default_pool)
    }
}
