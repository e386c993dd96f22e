//! Random-time access for scrubbing and playback
//!
//! Regular grids resolve a time to its nearest index arithmetically; anything
//! else falls back to a binary search. Either way the closest grid timestamp
//! wins, ties going to the earlier one.

use fightline_types::ActorId;

use super::{ActorPositionsTimeline, ActorSample, ActorTimeline};

/// One actor's sample at a looked-up time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorFrame<'a> {
    pub actor: &'a ActorTimeline,
    pub sample: &'a ActorSample,
}

impl ActorPositionsTimeline {
    /// Grid index closest to `timestamp` (relative ms).
    pub fn closest_index(&self, timestamp: i64) -> Option<usize> {
        let last = self.timestamps.len().checked_sub(1)?;
        let index = if self.has_regular_intervals && self.sample_interval > 0 {
            self.regular_index(timestamp, last)
        } else {
            self.search_index(timestamp)
        };
        Some(index.min(last))
    }

    fn regular_index(&self, timestamp: i64, last: usize) -> usize {
        let step = self.sample_interval;
        if timestamp <= 0 {
            return 0;
        }
        if timestamp >= self.timestamps[last] {
            return last;
        }
        // Rounds half down so ties go to the earlier index
        let index = ((timestamp + (step - 1) / 2) / step).min(last as i64) as usize;
        // Final timestamp may sit closer than a full step
        match self.timestamps.get(index + 1) {
            Some(&next) if next.abs_diff(timestamp) < timestamp.abs_diff(self.timestamps[index]) => {
                index + 1
            }
            _ => index,
        }
    }

    fn search_index(&self, timestamp: i64) -> usize {
        let ts = &self.timestamps;
        let upper = ts.partition_point(|&t| t < timestamp);
        if upper == 0 {
            return 0;
        }
        if upper == ts.len() {
            return ts.len() - 1;
        }
        let before = upper - 1;
        if timestamp - ts[before] <= ts[upper] - timestamp {
            before
        } else {
            upper
        }
    }

    /// The actor's sample nearest to `timestamp`, if it was visible there.
    pub fn lookup(&self, actor_id: ActorId, timestamp: i64) -> Option<&ActorSample> {
        let actor = self.actors.get(&actor_id)?;
        let index = self.closest_index(timestamp)?;
        actor.sample_at(index)
    }

    /// Every visible actor at the grid point nearest to `timestamp`, ordered
    /// by actor id.
    pub fn lookup_all(&self, timestamp: i64) -> Vec<ActorFrame<'_>> {
        let Some(index) = self.closest_index(timestamp) else {
            return Vec::new();
        };
        self.actors
            .values()
            .filter_map(|actor| {
                actor
                    .sample_at(index)
                    .map(|sample| ActorFrame { actor, sample })
            })
            .collect()
    }
}
