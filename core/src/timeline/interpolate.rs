use std::f64::consts::{PI, TAU};

use fightline_types::HealthSnapshot;

/// Position sample taken from an event snapshot, in game units with facing
/// already in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RawSample {
    pub timestamp: i64,
    pub x: f64,
    pub y: f64,
    pub facing: f64,
    pub health: Option<HealthSnapshot>,
}

/// Signed difference `to - from`, wrapped into `[-π, π)`.
pub fn shortest_angle_delta(from: f64, to: f64) -> f64 {
    (to - from + PI).rem_euclid(TAU) - PI
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Blend two samples at absolute time `timestamp`. Facing turns the short way.
pub(crate) fn between(before: &RawSample, after: &RawSample, timestamp: i64) -> RawSample {
    let span = (after.timestamp - before.timestamp) as f64;
    let t = if span > 0.0 {
        ((timestamp - before.timestamp) as f64 / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let health = match (before.health, after.health) {
        (Some(a), Some(b)) => Some(HealthSnapshot {
            current: lerp(a.current, b.current, t),
            max: lerp(a.max, b.max, t),
        }),
        (a, b) => a.or(b),
    };

    RawSample {
        timestamp,
        x: lerp(before.x, after.x, t),
        y: lerp(before.y, after.y, t),
        facing: before.facing + shortest_angle_delta(before.facing, after.facing) * t,
        health,
    }
}
