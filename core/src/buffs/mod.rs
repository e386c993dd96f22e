//! Buff/debuff interval index
//!
//! Folds apply/remove events into per-ability interval lists so the timeline
//! engine can ask "was ability X active on actor Y at time T" without
//! replaying the event stream. Intervals are half-open `[start, end)`.

use std::collections::BTreeMap;

use fightline_types::{ActorId, BuffEvent};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Taunt debuff applied by tanks to enemies
pub const TAUNT_ABILITY_ID: i64 = 38254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffInterval {
    pub start: i64,
    pub end: i64,
    pub target_id: ActorId,
    pub source_id: ActorId,
}

impl BuffInterval {
    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// Payload for building a [`BuffLookup`] on a worker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffLookupTask {
    #[serde(default)]
    pub events: Vec<BuffEvent>,
    /// Intervals still open at the end of the log are closed here
    #[serde(default)]
    pub fight_end_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffLookup {
    intervals: BTreeMap<i64, Vec<BuffInterval>>,
}

impl BuffLookup {
    /// Build the index from buff events in any order.
    ///
    /// An apply (or stack apply) opens an interval for `(ability, target)` if
    /// none is open; a remove closes it. Stack removals never close. Intervals
    /// left open end at `fight_end`, or never if it is unknown.
    pub fn from_events(events: &[BuffEvent], fight_end: Option<i64>) -> Self {
        let mut sorted: Vec<&BuffEvent> = events.iter().collect();
        sorted.sort_by_key(|e| e.timestamp);

        let mut open: HashMap<(i64, ActorId), (i64, ActorId)> = HashMap::new();
        let mut intervals: BTreeMap<i64, Vec<BuffInterval>> = BTreeMap::new();

        for event in sorted {
            let key = (event.ability_game_id, event.target_id);
            if event.kind.is_apply() {
                open.entry(key)
                    .or_insert((event.timestamp, event.source_id));
            } else if event.kind.is_remove()
                && let Some((start, source_id)) = open.remove(&key)
            {
                intervals.entry(key.0).or_default().push(BuffInterval {
                    start,
                    end: event.timestamp,
                    target_id: key.1,
                    source_id,
                });
            }
        }

        let end = fight_end.unwrap_or(i64::MAX);
        for ((ability, target_id), (start, source_id)) in open {
            intervals.entry(ability).or_default().push(BuffInterval {
                start,
                end: end.max(start),
                target_id,
                source_id,
            });
        }

        for list in intervals.values_mut() {
            list.sort_by_key(|i| (i.start, i.target_id));
        }

        Self { intervals }
    }

    pub fn intervals(&self, ability: i64) -> &[BuffInterval] {
        self.intervals.get(&ability).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn abilities(&self) -> impl Iterator<Item = i64> + '_ {
        self.intervals.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Active on any target
    pub fn is_active(&self, ability: i64, timestamp: i64) -> bool {
        self.candidates(ability, timestamp)
            .any(|i| i.contains(timestamp))
    }

    pub fn is_active_on_target(&self, ability: i64, timestamp: i64, target: ActorId) -> bool {
        self.active_interval(ability, timestamp, target).is_some()
    }

    /// The interval covering `timestamp` on `target`, if any.
    pub fn active_interval(
        &self,
        ability: i64,
        timestamp: i64,
        target: ActorId,
    ) -> Option<&BuffInterval> {
        self.candidates(ability, timestamp)
            .find(|i| i.target_id == target && i.contains(timestamp))
    }

    /// Intervals starting at or before `timestamp`
    fn candidates(&self, ability: i64, timestamp: i64) -> impl Iterator<Item = &BuffInterval> {
        let list = self.intervals(ability);
        let upto = list.partition_point(|i| i.start <= timestamp);
        list[..upto].iter()
    }
}
