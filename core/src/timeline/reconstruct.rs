//! Timeline reconstruction from raw combat events

use fightline_types::{
    ActorId, ActorKind, ActorMeta, CombatEvent, EventKind, Fight, HealthSnapshot, Resources,
};
use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::buffs::{BuffLookup, TAUNT_ABILITY_ID};
use crate::tasks::{TaskContext, TaskError};

use super::coords::{facing_radians, to_render_facing, to_world};
use super::interpolate::{RawSample, between};
use super::{ActorPositionsTask, ActorPositionsTimeline, ActorSample, ActorTimeline};

pub const DEFAULT_SAMPLE_INTERVAL_MS: i64 = 100;
/// Upper bound on grid points per fight; longer fights get a wider step
pub const MAX_TIMESTAMPS: i64 = 72_000;

/// Grid cells (timestamps x actors) above which a run is logged as heavy
const LARGE_TIMELINE_CELLS: usize = 2_000_000;
/// Events between progress reports and cancellation checks while ingesting
const INGEST_CHUNK: usize = 5_000;

// ─────────────────────────────────────────────────────────────────────────────
// Per-Actor History
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the event stream says about one actor
#[derive(Debug, Default)]
struct ActorHistory {
    first_seen: Option<i64>,
    /// Distinct timestamps the actor was a source or target, ascending
    activity: Vec<i64>,
    /// Ascending
    deaths: Vec<i64>,
    samples: Vec<RawSample>,
}

impl ActorHistory {
    fn touch(&mut self, timestamp: i64) {
        self.first_seen.get_or_insert(timestamp);
        if self.activity.last() != Some(&timestamp) {
            self.activity.push(timestamp);
        }
    }

    fn add_snapshot(&mut self, timestamp: i64, resources: &Resources) {
        let Some((x, y, facing)) = resources.position() else {
            return;
        };
        self.samples.push(RawSample {
            timestamp,
            x: f64::from(x),
            y: f64::from(y),
            facing: facing_radians(f64::from(facing)),
            health: resources.health().map(|(current, max)| HealthSnapshot {
                current: current as f64,
                max: max as f64,
            }),
        });
    }

    /// Dead iff the latest death at or before `t` has no activity after it
    /// (up to `t`). Later activity counts as a revive.
    fn is_alive_at(&self, t: i64) -> bool {
        let died = self.deaths.partition_point(|&d| d <= t);
        if died == 0 {
            return true;
        }
        let death = self.deaths[died - 1];
        let next = self.activity.partition_point(|&a| a <= death);
        next < self.activity.len() && self.activity[next] <= t
    }

    /// A death in `(after, upto]`
    fn died_between(&self, after: i64, upto: i64) -> bool {
        let i = self.deaths.partition_point(|&d| d <= after);
        i < self.deaths.len() && self.deaths[i] <= upto
    }

    /// Position at `t`. `cursor` tracks the first sample after the previous
    /// query and only moves forward, so `t` must not decrease between calls.
    fn position_at(&self, t: i64, cursor: &mut usize) -> Option<RawSample> {
        let samples = &self.samples;
        match samples.len() {
            0 => return None,
            1 => return Some(samples[0]),
            _ => {}
        }

        while *cursor < samples.len() && samples[*cursor].timestamp <= t {
            *cursor += 1;
        }
        let before = cursor.checked_sub(1).map(|i| samples[i]);
        let after = samples.get(*cursor).copied();

        match (before, after) {
            // Don't slide a corpse toward where it respawns
            (Some(b), Some(_)) if self.died_between(b.timestamp, t) => Some(b),
            (Some(b), Some(a)) => Some(between(&b, &a, t)),
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn classify(actor_id: ActorId, fight: &Fight, meta: Option<&ActorMeta>) -> ActorKind {
    if fight.is_friendly_player(actor_id) {
        ActorKind::Player
    } else if meta.is_some_and(ActorMeta::is_boss) {
        ActorKind::Boss
    } else if fight.is_friendly_npc(actor_id) {
        ActorKind::FriendlyNpc
    } else {
        ActorKind::Enemy
    }
}

fn resolve_name(actor_id: ActorId, task: &ActorPositionsTask) -> String {
    task.actors
        .get(&actor_id)
        .and_then(|meta| meta.name.clone())
        .or_else(|| task.roster.get(&actor_id).map(|r| r.name.clone()))
        .unwrap_or_else(|| format!("Actor {actor_id}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Reconstruction
// ─────────────────────────────────────────────────────────────────────────────

/// Requested step widened so the grid stays within [`MAX_TIMESTAMPS`].
fn capped_step(duration: i64, requested: i64) -> i64 {
    if duration <= 0 {
        return requested;
    }
    requested.max((duration as u64).div_ceil(MAX_TIMESTAMPS as u64) as i64)
}

/// `0, step, 2*step, ...` up to `duration`, always ending on `duration`.
fn sample_grid(duration: i64, step: i64) -> Vec<i64> {
    let duration = duration.max(0);
    let mut grid: Vec<i64> = (0..=duration).step_by(step as usize).collect();
    if grid.last() != Some(&duration) {
        grid.push(duration);
    }
    grid
}

fn ingest(
    events: &[&CombatEvent],
    ctx: &TaskContext,
) -> Result<HashMap<ActorId, ActorHistory>, TaskError> {
    let mut histories: HashMap<ActorId, ActorHistory> = HashMap::new();
    let total = events.len().max(1);

    for (i, event) in events.iter().enumerate() {
        if i % INGEST_CHUNK == 0 && i > 0 {
            ctx.checkpoint()?;
            ctx.report(0.1 + 0.2 * i as f32 / total as f32);
        }

        let ts = event.timestamp;
        let source = histories.entry(event.source_id).or_default();
        source.touch(ts);
        if let Some(res) = &event.source_resources {
            source.add_snapshot(ts, res);
        }

        if let Some(target_id) = event.target_id {
            let target = histories.entry(target_id).or_default();
            target.touch(ts);
            if event.kind == EventKind::Death {
                target.deaths.push(ts);
            }
            if let Some(res) = &event.target_resources {
                target.add_snapshot(ts, res);
            }
        }
    }

    Ok(histories)
}

fn is_taunted(
    debuffs: Option<&BuffLookup>,
    histories: &HashMap<ActorId, ActorHistory>,
    actor_id: ActorId,
    t: i64,
) -> bool {
    let Some(interval) = debuffs.and_then(|d| d.active_interval(TAUNT_ABILITY_ID, t, actor_id))
    else {
        return false;
    };
    // A dead tank no longer holds the taunt
    histories
        .get(&interval.source_id)
        .is_none_or(|source| source.is_alive_at(t))
}

/// Reconstruct every actor's timeline for one fight.
///
/// Missing fight or event data yields an empty timeline rather than an error.
/// Reports progress through `ctx` and stops with [`TaskError::Cancelled`]
/// once its token is tripped.
pub fn reconstruct(
    task: &ActorPositionsTask,
    ctx: &TaskContext,
) -> Result<ActorPositionsTimeline, TaskError> {
    let step = if task.sample_interval_ms > 0 {
        task.sample_interval_ms
    } else {
        DEFAULT_SAMPLE_INTERVAL_MS
    };
    ctx.report(0.0);

    let (Some(fight), Some(events)) = (&task.fight, &task.events) else {
        ctx.report(1.0);
        return Ok(ActorPositionsTimeline::empty(step));
    };
    if events.is_empty() {
        ctx.report(1.0);
        return Ok(ActorPositionsTimeline::empty(step));
    }

    let mut merged: Vec<&CombatEvent> = events.iter().collect();
    merged.sort_by_key(|e| e.timestamp);
    ctx.report(0.1);

    let mut histories = ingest(&merged, ctx)?;
    ctx.report(0.3);

    for history in histories.values_mut() {
        history.samples.sort_by_key(|s| s.timestamp);
    }
    let mut actor_ids: Vec<ActorId> = histories
        .iter()
        .filter(|(_, h)| !h.samples.is_empty())
        .map(|(id, _)| *id)
        .collect();
    actor_ids.sort_unstable();
    ctx.report(0.5);

    let requested = step;
    let step = capped_step(fight.duration(), requested);
    if step != requested {
        debug!(
            fight_id = fight.id,
            requested,
            step,
            "Widened sample interval for long fight"
        );
    }
    let grid = sample_grid(fight.duration(), step);
    ctx.report(0.6);

    let cells = grid.len() * actor_ids.len();
    if cells > LARGE_TIMELINE_CELLS {
        warn!(
            fight_id = fight.id,
            timestamps = grid.len(),
            actors = actor_ids.len(),
            "Large actor timeline, consider a coarser sample interval"
        );
    }

    let mut timeline = ActorPositionsTimeline {
        actors: Default::default(),
        timestamps: Vec::new(),
        fight_duration: fight.duration().max(0),
        fight_start_time: fight.start_time,
        sample_interval: step,
        has_regular_intervals: step == requested,
    };

    let actor_count = actor_ids.len().max(1);
    for (n, &actor_id) in actor_ids.iter().enumerate() {
        ctx.checkpoint()?;
        let Some(history) = histories.get(&actor_id) else {
            continue;
        };

        let kind = classify(actor_id, fight, task.actors.get(&actor_id));
        let role = match kind {
            ActorKind::Player => task.roster.get(&actor_id).and_then(|r| r.role),
            _ => None,
        };
        let mut actor = ActorTimeline::new(actor_id, resolve_name(actor_id, task), kind, role);

        let mut cursor = 0;
        for (index, &offset) in grid.iter().enumerate() {
            let t = fight.start_time + offset;
            if history.first_seen.is_some_and(|first| t < first) {
                continue;
            }
            let is_alive = history.is_alive_at(t);
            if !is_alive && kind != ActorKind::Player {
                continue;
            }
            let Some(raw) = history.position_at(t, &mut cursor) else {
                continue;
            };
            let is_taunted =
                kind.is_hostile() && is_taunted(task.debuffs.as_ref(), &histories, actor_id, t);
            // Bosses open every pull at full health
            let health = match raw.health {
                Some(h) if kind == ActorKind::Boss && offset == 0 && h.max > 0.0 => {
                    Some(HealthSnapshot { current: h.max, max: h.max })
                }
                other => other,
            };

            actor.record(
                index,
                ActorSample {
                    timestamp: offset,
                    position: to_world(raw.x, raw.y),
                    facing: to_render_facing(raw.facing),
                    is_alive,
                    is_taunted,
                    health,
                },
            );
        }

        if !actor.is_empty() {
            timeline.actors.insert(actor_id, actor);
        }
        ctx.report(0.6 + 0.4 * (n + 1) as f32 / actor_count as f32);
    }

    timeline.timestamps = grid;
    debug!(
        fight_id = fight.id,
        actors = timeline.actors.len(),
        timestamps = timeline.timestamps.len(),
        "Reconstructed actor timelines"
    );
    ctx.report(1.0);
    Ok(timeline)
}
