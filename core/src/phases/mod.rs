//! Map timeline
//!
//! Works out which map was active at each moment of a fight. Boundaries come
//! from the best source available:
//!
//! 1. Explicit phase transitions (from the caller or the fight itself)
//! 2. Buff applications inside the fight, used as phase-change signals
//! 3. An even split of the fight across its maps
//!
//! The even split is a guess; [`MapTimeline::is_approximate`] reports it.

use fightline_types::{BuffEvent, Fight, FightMap, PhaseTransition};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapTimelineEntry {
    /// Absolute ms, inclusive
    pub start_time: i64,
    /// Absolute ms, exclusive
    pub end_time: i64,
    pub map_id: i64,
    pub map_file: Option<String>,
    pub map_name: Option<String>,
    pub phase_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoundarySource {
    ExplicitPhases,
    BuffSignal,
    EvenSplit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapTimeline {
    pub entries: Vec<MapTimelineEntry>,
    pub total_maps: usize,
    source: Option<BoundarySource>,
}

impl MapTimeline {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            total_maps: 0,
            source: None,
        }
    }

    /// Build the timeline for `fight`.
    ///
    /// `explicit` overrides `fight.phase_transitions` when given. `signal`
    /// events are only consulted if no usable explicit boundaries exist.
    pub fn build(
        fight: Option<&Fight>,
        explicit: Option<&[PhaseTransition]>,
        signal: Option<&[BuffEvent]>,
    ) -> Self {
        let Some(fight) = fight else {
            return Self::empty();
        };
        let maps: Vec<&FightMap> = fight.maps.iter().flatten().collect();
        if maps.is_empty() {
            return Self::empty();
        }

        let transitions = explicit.unwrap_or(&fight.phase_transitions);
        let (source, starts) = if let Some(starts) = explicit_starts(fight, transitions) {
            (BoundarySource::ExplicitPhases, starts)
        } else if let Some(starts) = signal.and_then(|events| signal_starts(fight, events, maps.len())) {
            (BoundarySource::BuffSignal, starts)
        } else {
            (BoundarySource::EvenSplit, even_starts(fight, maps.len()))
        };

        let entries = starts
            .iter()
            .enumerate()
            .map(|(i, &start_time)| {
                let map = maps[i.min(maps.len() - 1)];
                MapTimelineEntry {
                    start_time,
                    end_time: starts.get(i + 1).copied().unwrap_or(fight.end_time),
                    map_id: map.id,
                    map_file: map.file.clone(),
                    map_name: map.name.clone(),
                    phase_index: i,
                }
            })
            .collect();

        Self {
            entries,
            total_maps: maps.len(),
            source: Some(source),
        }
    }

    pub fn source(&self) -> Option<BoundarySource> {
        self.source
    }

    pub fn is_approximate(&self) -> bool {
        self.source == Some(BoundarySource::EvenSplit)
    }

    /// Entry active at `timestamp`. Times before the first entry map to it,
    /// times at or past the last boundary map to the last entry.
    pub fn lookup_at(&self, timestamp: i64) -> Option<&MapTimelineEntry> {
        let after = self.entries.partition_point(|e| e.start_time <= timestamp);
        self.entries.get(after.saturating_sub(1))
    }
}

/// Sorted, deduplicated transition times before fight end.
fn explicit_starts(fight: &Fight, transitions: &[PhaseTransition]) -> Option<Vec<i64>> {
    let mut starts: Vec<i64> = transitions
        .iter()
        .map(|t| t.start_time.max(fight.start_time))
        .filter(|&t| t < fight.end_time)
        .collect();
    starts.sort_unstable();
    starts.dedup();
    (!starts.is_empty()).then_some(starts)
}

/// Fight start plus the first `maps - 1` distinct buff application times
/// strictly inside the fight.
fn signal_starts(fight: &Fight, events: &[BuffEvent], maps: usize) -> Option<Vec<i64>> {
    let mut boundaries: Vec<i64> = events
        .iter()
        .filter(|e| e.kind.is_initial_apply())
        .map(|e| e.timestamp)
        .filter(|&t| t > fight.start_time && t < fight.end_time)
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();
    boundaries.truncate(maps.saturating_sub(1));
    if boundaries.is_empty() {
        return None;
    }

    let mut starts = Vec::with_capacity(boundaries.len() + 1);
    starts.push(fight.start_time);
    starts.extend(boundaries);
    Some(starts)
}

fn even_starts(fight: &Fight, maps: usize) -> Vec<i64> {
    let span = fight.duration().max(0) / maps as i64;
    (0..maps as i64).map(|i| fight.start_time + i * span).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fightline_types::BuffEventKind;

    const FIGHT_START: i64 = 0;
    const FIGHT_END: i64 = 300_000;

    fn map(id: i64) -> Option<FightMap> {
        Some(FightMap {
            id,
            file: Some(format!("map{id}.png")),
            name: Some(format!("Map {id}")),
        })
    }

    fn fight(maps: Vec<Option<FightMap>>, transitions: Vec<(i64, i64)>) -> Fight {
        Fight {
            id: 1,
            start_time: FIGHT_START,
            end_time: FIGHT_END,
            maps,
            phase_transitions: transitions
                .into_iter()
                .map(|(id, start_time)| PhaseTransition { id, start_time })
                .collect(),
            ..Default::default()
        }
    }

    fn buff(timestamp: i64) -> BuffEvent {
        BuffEvent {
            timestamp,
            kind: BuffEventKind::ApplyBuff,
            ability_game_id: 1,
            source_id: 1,
            target_id: 2,
        }
    }

    #[test]
    fn test_explicit_phases() {
        let fight = fight(
            vec![map(1), map(2), map(3)],
            vec![(1, 0), (2, 100_000), (3, 200_000)],
        );
        let timeline = MapTimeline::build(Some(&fight), None, None);

        assert_eq!(timeline.source(), Some(BoundarySource::ExplicitPhases));
        assert_eq!(timeline.total_maps, 3);
        let spans: Vec<(i64, i64, i64)> = timeline
            .entries
            .iter()
            .map(|e| (e.start_time, e.end_time, e.map_id))
            .collect();
        assert_eq!(
            spans,
            vec![(0, 100_000, 1), (100_000, 200_000, 2), (200_000, 300_000, 3)]
        );
        assert_eq!(timeline.entries[1].map_name.as_deref(), Some("Map 2"));
        assert_eq!(timeline.entries[2].phase_index, 2);
    }

    #[test]
    fn test_lookup_boundaries_and_clamping() {
        let fight = fight(vec![map(1), map(2)], vec![(1, 0), (2, 150_000)]);
        let timeline = MapTimeline::build(Some(&fight), None, None);

        assert_eq!(timeline.lookup_at(-50).map(|e| e.map_id), Some(1));
        assert_eq!(timeline.lookup_at(149_999).map(|e| e.map_id), Some(1));
        assert_eq!(timeline.lookup_at(150_000).map(|e| e.map_id), Some(2));
        assert_eq!(timeline.lookup_at(FIGHT_END).map(|e| e.map_id), Some(2));
        assert_eq!(timeline.lookup_at(FIGHT_END + 1).map(|e| e.map_id), Some(2));
    }

    #[test]
    fn test_unsorted_and_duplicate_transitions() {
        let fight = fight(
            vec![map(1), map(2)],
            vec![(2, 150_000), (1, 0), (3, 150_000)],
        );
        let timeline = MapTimeline::build(Some(&fight), None, None);

        let starts: Vec<i64> = timeline.entries.iter().map(|e| e.start_time).collect();
        assert_eq!(starts, vec![0, 150_000]);
    }

    #[test]
    fn test_transition_at_fight_end_dropped() {
        let fight = fight(vec![map(1), map(2)], vec![(1, 0), (2, FIGHT_END)]);
        let timeline = MapTimeline::build(Some(&fight), None, None);

        assert_eq!(timeline.entries.len(), 1);
        assert_eq!(timeline.entries[0].end_time, FIGHT_END);
    }

    #[test]
    fn test_explicit_override_wins() {
        let fight = fight(vec![map(1), map(2)], vec![(1, 0), (2, 150_000)]);
        let override_phases = [
            PhaseTransition { id: 1, start_time: 0 },
            PhaseTransition { id: 2, start_time: 90_000 },
        ];
        let timeline = MapTimeline::build(Some(&fight), Some(&override_phases), None);
        assert_eq!(timeline.entries[1].start_time, 90_000);
    }

    #[test]
    fn test_boundaries_inferred_from_buff_signal() {
        let fight = fight(vec![map(1), map(2), map(3)], vec![]);
        let signal = [buff(0), buff(120_000), buff(120_000), buff(240_000), buff(280_000)];
        let timeline = MapTimeline::build(Some(&fight), None, Some(&signal));

        assert_eq!(timeline.source(), Some(BoundarySource::BuffSignal));
        let starts: Vec<i64> = timeline.entries.iter().map(|e| e.start_time).collect();
        assert_eq!(starts, vec![0, 120_000, 240_000]);
        assert_eq!(timeline.entries[2].end_time, FIGHT_END);
        assert!(!timeline.is_approximate());
    }

    #[test]
    fn test_even_split_fallback() {
        let fight = fight(vec![map(1), None, map(2), map(3)], vec![]);
        let timeline = MapTimeline::build(Some(&fight), None, Some(&[]));

        assert!(timeline.is_approximate());
        assert_eq!(timeline.total_maps, 3);
        let spans: Vec<(i64, i64)> = timeline
            .entries
            .iter()
            .map(|e| (e.start_time, e.end_time))
            .collect();
        assert_eq!(
            spans,
            vec![(0, 100_000), (100_000, 200_000), (200_000, 300_000)]
        );
        assert_eq!(timeline.entries[1].map_id, 2);
    }

    #[test]
    fn test_single_map_covers_fight() {
        let fight = fight(vec![map(4)], vec![]);
        let timeline = MapTimeline::build(Some(&fight), None, None);
        assert_eq!(timeline.entries.len(), 1);
        assert_eq!(timeline.lookup_at(12_345).map(|e| e.map_id), Some(4));
    }

    #[test]
    fn test_no_fight_or_maps_is_empty() {
        assert!(MapTimeline::build(None, None, None).entries.is_empty());

        let fight = fight(vec![None, None], vec![(1, 0)]);
        let timeline = MapTimeline::build(Some(&fight), None, None);
        assert!(timeline.entries.is_empty());
        assert!(timeline.lookup_at(0).is_none());
        assert_eq!(timeline.source(), None);
    }
}
