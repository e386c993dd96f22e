//! Tests for timeline lookups

use fightline_types::ActorKind;

use super::{ActorPositionsTimeline, ActorSample, ActorTrack};

fn sample(timestamp: i64, x: f64) -> ActorSample {
    ActorSample {
        timestamp,
        position: [x, 0.0, 0.0],
        facing: 0.0,
        is_alive: true,
        is_taunted: false,
        health: None,
    }
}

fn track(actor_id: i64, samples: Vec<ActorSample>) -> ActorTrack {
    ActorTrack {
        actor_id,
        name: format!("Actor {actor_id}"),
        kind: ActorKind::Enemy,
        role: None,
        samples,
    }
}

/// Grid 0, 100, 200, 250 for two actors; actor 2 only appears from 200
fn regular_timeline() -> ActorPositionsTimeline {
    ActorPositionsTimeline::from_tracks(
        0,
        250,
        vec![
            track(
                1,
                vec![sample(0, 0.0), sample(100, 1.0), sample(200, 2.0), sample(250, 2.5)],
            ),
            track(2, vec![sample(200, 20.0), sample(250, 25.0)]),
        ],
    )
}

#[test]
fn test_regular_detection_with_short_tail() {
    let timeline = regular_timeline();
    assert!(timeline.has_regular_intervals);
    assert_eq!(timeline.sample_interval, 100);
    assert_eq!(timeline.timestamps, vec![0, 100, 200, 250]);
}

#[test]
fn test_regular_nearest_index() {
    let timeline = regular_timeline();
    assert_eq!(timeline.closest_index(-40), Some(0));
    assert_eq!(timeline.closest_index(49), Some(0));
    assert_eq!(timeline.closest_index(50), Some(0));
    assert_eq!(timeline.closest_index(51), Some(1));
    assert_eq!(timeline.closest_index(224), Some(2));
    assert_eq!(timeline.closest_index(226), Some(3));
    assert_eq!(timeline.closest_index(10_000), Some(3));
}

#[test]
fn test_lookup_returns_nearest_sample() {
    let timeline = regular_timeline();
    assert_eq!(timeline.lookup(1, 90).map(|s| s.position[0]), Some(1.0));
    assert_eq!(timeline.lookup(1, 240).map(|s| s.position[0]), Some(2.5));
    // Not visible yet at index 1
    assert!(timeline.lookup(2, 100).is_none());
    assert_eq!(timeline.lookup(2, 210).map(|s| s.position[0]), Some(20.0));
    assert!(timeline.lookup(99, 100).is_none());
}

#[test]
fn test_lookup_all_skips_invisible_actors() {
    let timeline = regular_timeline();

    let early = timeline.lookup_all(0);
    assert_eq!(early.len(), 1);
    assert_eq!(early[0].actor.actor_id, 1);

    let late = timeline.lookup_all(250);
    let ids: Vec<i64> = late.iter().map(|f| f.actor.actor_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(late[1].sample.position[0], 25.0);
}

#[test]
fn test_extreme_timestamps_clamp_to_ends() {
    let regular = regular_timeline();
    assert_eq!(regular.closest_index(i64::MAX), Some(3));
    assert_eq!(regular.closest_index(i64::MIN), Some(0));
    assert_eq!(regular.lookup(1, i64::MAX).map(|s| s.position[0]), Some(2.5));
    assert_eq!(regular.lookup_all(i64::MIN).len(), 1);

    let irregular = ActorPositionsTimeline::from_tracks(
        0,
        900,
        vec![track(1, vec![sample(0, 0.0), sample(100, 1.0), sample(900, 9.0)])],
    );
    assert!(!irregular.has_regular_intervals);
    assert_eq!(irregular.closest_index(i64::MAX), Some(2));
    assert_eq!(irregular.closest_index(i64::MIN), Some(0));
}

#[test]
fn test_irregular_closest_with_earlier_tie() {
    let timeline = ActorPositionsTimeline::from_tracks(
        1_000,
        900,
        vec![track(
            1,
            vec![sample(0, 0.0), sample(100, 1.0), sample(400, 4.0), sample(900, 9.0)],
        )],
    );
    assert!(!timeline.has_regular_intervals);

    assert_eq!(timeline.closest_index(-5), Some(0));
    assert_eq!(timeline.closest_index(240), Some(1));
    assert_eq!(timeline.closest_index(250), Some(1));
    assert_eq!(timeline.closest_index(260), Some(2));
    assert_eq!(timeline.closest_index(650), Some(2));
    assert_eq!(timeline.closest_index(651), Some(3));
    assert_eq!(timeline.closest_index(5_000), Some(3));
    assert_eq!(timeline.lookup(1, 700).map(|s| s.position[0]), Some(9.0));
}

#[test]
fn test_empty_timeline_lookups() {
    let timeline = ActorPositionsTimeline::empty(100);
    assert!(timeline.is_empty());
    assert_eq!(timeline.closest_index(0), None);
    assert!(timeline.lookup(1, 0).is_none());
    assert!(timeline.lookup_all(0).is_empty());
}
