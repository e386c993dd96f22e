//! Actor position timelines
//!
//! Reconstructs where every actor was, which way it faced and whether it was
//! alive or taunted, on a fixed time grid over the fight. Positions only exist
//! where an event happened to carry a resource snapshot; everything in between
//! is interpolated.
//!
//! Reconstruction is pure: the same task always yields the same timeline.

mod coords;
mod interpolate;
mod lookup;
mod reconstruct;

#[cfg(test)]
mod lookup_tests;

pub use coords::{
    FACING_SCALE, MAP_CENTER_X, MAP_CENTER_Y, WORLD_SCALE, to_render_facing, to_world,
};
pub use interpolate::shortest_angle_delta;
pub use lookup::ActorFrame;
pub use reconstruct::{DEFAULT_SAMPLE_INTERVAL_MS, MAX_TIMESTAMPS, reconstruct};

use std::collections::{BTreeMap, HashMap};

use fightline_types::{
    ActorId, ActorKind, ActorMeta, Fight, FightEvents, HealthSnapshot, RosterEntry, Role,
};
use serde::{Deserialize, Serialize};

use crate::buffs::BuffLookup;

fn default_sample_interval() -> i64 {
    DEFAULT_SAMPLE_INTERVAL_MS
}

/// Input for one reconstruction run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorPositionsTask {
    #[serde(default)]
    pub fight: Option<Fight>,
    #[serde(default)]
    pub events: Option<FightEvents>,
    #[serde(default, rename = "rosterById")]
    pub roster: HashMap<ActorId, RosterEntry>,
    #[serde(default, rename = "actorsById")]
    pub actors: HashMap<ActorId, ActorMeta>,
    /// Debuff index consulted for taunts
    #[serde(default)]
    pub debuffs: Option<BuffLookup>,
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: i64,
}

impl ActorPositionsTask {
    pub fn new(fight: Fight, events: FightEvents) -> Self {
        Self {
            fight: Some(fight),
            events: Some(events),
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            ..Default::default()
        }
    }

    pub fn with_roster(mut self, roster: HashMap<ActorId, RosterEntry>) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_actors(mut self, actors: HashMap<ActorId, ActorMeta>) -> Self {
        self.actors = actors;
        self
    }

    pub fn with_debuffs(mut self, debuffs: BuffLookup) -> Self {
        self.debuffs = Some(debuffs);
        self
    }

    pub fn with_sample_interval(mut self, interval_ms: i64) -> Self {
        self.sample_interval_ms = interval_ms;
        self
    }
}

/// One actor's state at one grid timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorSample {
    /// Milliseconds since fight start
    pub timestamp: i64,
    /// World space `[x, height, z]`; height is always 0
    pub position: [f64; 3],
    /// Radians, in the renderer's frame
    pub facing: f64,
    pub is_alive: bool,
    pub is_taunted: bool,
    pub health: Option<HealthSnapshot>,
}

/// Samples of one actor, aligned to the shared timestamp grid.
///
/// Slot `i` holds the sample for grid index `first_index + i`; grid points
/// where the actor was not visible are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorTimeline {
    pub actor_id: ActorId,
    pub name: String,
    pub kind: ActorKind,
    pub role: Option<Role>,
    first_index: usize,
    slots: Vec<Option<ActorSample>>,
}

impl ActorTimeline {
    pub fn new(actor_id: ActorId, name: String, kind: ActorKind, role: Option<Role>) -> Self {
        Self {
            actor_id,
            name,
            kind,
            role,
            first_index: 0,
            slots: Vec::new(),
        }
    }

    /// Append the sample for grid `index`. Indices must increase.
    pub(crate) fn record(&mut self, index: usize, sample: ActorSample) {
        if self.slots.is_empty() {
            self.first_index = index;
        }
        let slot = index - self.first_index;
        if slot >= self.slots.len() {
            self.slots.resize(slot, None);
            self.slots.push(Some(sample));
        }
    }

    pub fn sample_at(&self, index: usize) -> Option<&ActorSample> {
        let slot = index.checked_sub(self.first_index)?;
        self.slots.get(slot)?.as_ref()
    }

    pub fn samples(&self) -> impl Iterator<Item = &ActorSample> {
        self.slots.iter().flatten()
    }

    pub fn first_index(&self) -> usize {
        self.first_index
    }

    pub fn len(&self) -> usize {
        self.samples().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Samples for one actor on arbitrary timestamps, for
/// [`ActorPositionsTimeline::from_tracks`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActorTrack {
    pub actor_id: ActorId,
    pub name: String,
    pub kind: ActorKind,
    pub role: Option<Role>,
    pub samples: Vec<ActorSample>,
}

/// Every actor's timeline over one fight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorPositionsTimeline {
    pub actors: BTreeMap<ActorId, ActorTimeline>,
    /// Sorted, relative to fight start
    pub timestamps: Vec<i64>,
    pub fight_duration: i64,
    pub fight_start_time: i64,
    pub sample_interval: i64,
    /// Timestamps are `0, step, 2*step, ...` with at most a shorter last step
    pub has_regular_intervals: bool,
}

impl ActorPositionsTimeline {
    pub fn empty(sample_interval: i64) -> Self {
        Self {
            actors: BTreeMap::new(),
            timestamps: Vec::new(),
            fight_duration: 0,
            fight_start_time: 0,
            sample_interval,
            has_regular_intervals: true,
        }
    }

    /// Build from per-actor samples on arbitrary timestamps. The grid is the
    /// sorted union of all sample timestamps; regularity is detected.
    pub fn from_tracks(fight_start_time: i64, fight_duration: i64, tracks: Vec<ActorTrack>) -> Self {
        let mut timestamps: Vec<i64> = tracks
            .iter()
            .flat_map(|t| t.samples.iter().map(|s| s.timestamp))
            .collect();
        timestamps.sort_unstable();
        timestamps.dedup();

        let (has_regular_intervals, sample_interval) = detect_regular_step(&timestamps);

        let mut actors = BTreeMap::new();
        for track in tracks {
            let mut timeline = ActorTimeline::new(track.actor_id, track.name, track.kind, track.role);
            let mut samples = track.samples;
            samples.sort_by_key(|s| s.timestamp);
            for sample in samples {
                if let Ok(index) = timestamps.binary_search(&sample.timestamp) {
                    timeline.record(index, sample);
                }
            }
            if !timeline.is_empty() {
                actors.insert(timeline.actor_id, timeline);
            }
        }

        Self {
            actors,
            timestamps,
            fight_duration,
            fight_start_time,
            sample_interval,
            has_regular_intervals,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty() || self.timestamps.is_empty()
    }

    pub fn actor(&self, actor_id: ActorId) -> Option<&ActorTimeline> {
        self.actors.get(&actor_id)
    }
}

/// `(regular, step)` for a sorted timestamp list
fn detect_regular_step(timestamps: &[i64]) -> (bool, i64) {
    match timestamps {
        [] => (true, 0),
        [only] => (*only == 0, 0),
        [first, second, ..] => {
            let step = second - first;
            let n = timestamps.len();
            let body_regular = timestamps[..n - 1].windows(2).all(|w| w[1] - w[0] == step);
            let tail = timestamps[n - 1] - timestamps[n - 2];
            let regular = *first == 0 && step > 0 && body_regular && tail > 0 && tail <= step;
            (regular, step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_step_detection() {
        assert_eq!(detect_regular_step(&[0, 100, 200, 250]), (true, 100));
        assert_eq!(detect_regular_step(&[0, 100, 200, 300]), (true, 100));
        assert!(!detect_regular_step(&[0, 100, 250, 300]).0);
        assert!(!detect_regular_step(&[10, 110, 210]).0);
        assert!(!detect_regular_step(&[0, 100, 200, 350]).0);
    }

    #[test]
    fn test_record_leaves_gaps() {
        let sample = ActorSample {
            timestamp: 0,
            position: [0.0; 3],
            facing: 0.0,
            is_alive: true,
            is_taunted: false,
            health: None,
        };
        let mut timeline = ActorTimeline::new(1, "a".into(), ActorKind::Enemy, None);
        timeline.record(3, sample);
        timeline.record(6, sample);

        assert_eq!(timeline.first_index(), 3);
        assert!(timeline.sample_at(2).is_none());
        assert!(timeline.sample_at(3).is_some());
        assert!(timeline.sample_at(4).is_none());
        assert!(timeline.sample_at(6).is_some());
        assert!(timeline.sample_at(7).is_none());
        assert_eq!(timeline.len(), 2);
    }
}
