// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Clock unification across lifecycle states.

mod common;

use common::{manual_registry, TestSource};
use streamlib_clock::{ClockOptions, ClockSettings, ClockSync, StreamError, SyncMode};

#[test]
fn test_unify_is_idempotent() {
    let (registry, _time) = manual_registry(ClockSettings::default());
    let a = registry.create_clock(ClockOptions::new(SyncMode::Cpu).with_id("a"));
    let b = registry.create_clock(ClockOptions::new(SyncMode::Automatic));

    a.unify(&b).unwrap();
    a.unify(&b).unwrap();
    b.unify(&a).unwrap();

    assert_eq!(a, b);
    assert_eq!(registry.clocks().len(), 1);
}

#[test]
fn test_unify_is_commutative() {
    for swap in [false, true] {
        let (registry, _time) = manual_registry(ClockSettings::default());
        let pending = registry.create_clock(ClockOptions::new(SyncMode::Automatic));
        let running = registry.create_clock(ClockOptions::new(SyncMode::Cpu).with_id("main"));
        running.start(true).unwrap();

        if swap {
            running.unify(&pending).unwrap();
        } else {
            pending.unify(&running).unwrap();
        }

        assert_eq!(pending, running);
        assert_eq!(pending.sync(), ClockSync::Cpu);
        assert_eq!(pending.id(), "main");
    }
}

#[test]
fn test_started_clocks_with_different_sync_conflict() {
    let (registry, _time) = manual_registry(ClockSettings::default());
    let cpu = registry.create_clock(ClockOptions::new(SyncMode::Cpu).with_id("video"));
    let unsynced = registry.create_clock(ClockOptions::new(SyncMode::Unsynced).with_id("render"));
    cpu.start(true).unwrap();
    unsynced.start(true).unwrap();

    let err = cpu.unify(&unsynced).unwrap_err();

    assert!(matches!(err, StreamError::ClockConflict { .. }));
    assert!(err.to_string().contains("video(cpu)"));
    assert!(err.to_string().contains("render(unsynced)"));
    assert_ne!(cpu, unsynced);
    assert_eq!(cpu.sync(), ClockSync::Cpu);
    assert_eq!(unsynced.sync(), ClockSync::Unsynced);
}

#[test]
fn test_two_started_clocks_never_merge() {
    let (registry, _time) = manual_registry(ClockSettings::default());
    let a = registry.create_clock(ClockOptions::new(SyncMode::Cpu));
    let b = registry.create_clock(ClockOptions::new(SyncMode::Cpu));
    a.start(true).unwrap();
    b.start(true).unwrap();

    assert!(matches!(a.unify(&b), Err(StreamError::ClockConflict { .. })));
}

#[test]
fn test_committed_stopped_clock_cannot_join_other_policy() {
    let (registry, _time) = manual_registry(ClockSettings::default());
    let passive = registry.create_clock(ClockOptions::new(SyncMode::Passive));
    let cpu = registry.create_clock(ClockOptions::new(SyncMode::Cpu));
    cpu.start(true).unwrap();

    let err = passive
        .unify_at(&cpu, Some("graph.yaml:12"))
        .unwrap_err();
    assert!(err.to_string().contains("(at graph.yaml:12)"));
    assert_eq!(passive.pending_sync(), Some(SyncMode::Passive));
}

#[test]
fn test_pending_sources_follow_the_merge() {
    let (registry, _time) = manual_registry(ClockSettings::default());
    let running = registry.create_clock(ClockOptions::new(SyncMode::Unsynced));
    running.start(true).unwrap();

    let late = registry.create_clock(ClockOptions::new(SyncMode::Automatic));
    let (speaker, counters) = TestSource::output("speaker").build();
    late.attach(&speaker);

    late.unify(&running).unwrap();
    assert_eq!(running.pending_sources().len(), 1);

    late.tick().unwrap();

    assert_eq!(counters.wake_ups(), 1);
    assert_eq!(counters.outputs(), 1);
    assert_eq!(running.outputs().len(), 1);
}

#[test]
fn test_handles_survive_redirect_chains() {
    let (registry, _time) = manual_registry(ClockSettings::default());
    let clocks: Vec<_> = (0..5)
        .map(|_| registry.create_clock(ClockOptions::new(SyncMode::Automatic)))
        .collect();
    let main = registry.create_clock(ClockOptions::new(SyncMode::Cpu).with_id("main"));

    for pair in clocks.windows(2) {
        pair[0].unify(&pair[1]).unwrap();
    }
    clocks[0].unify(&main).unwrap();

    assert_eq!(registry.clocks().len(), 1);
    for clock in &clocks {
        assert_eq!(clock, &main);
        assert_eq!(clock.id(), "main");
        assert_eq!(clock.sync_mode(), SyncMode::Cpu);
    }
}

#[test]
fn test_merge_into_running_clock_starts_inherited_sub_clocks() {
    let (registry, _time) = manual_registry(ClockSettings::default());
    let running = registry.create_clock(ClockOptions::new(SyncMode::Unsynced).with_id("main"));
    running.start(true).unwrap();

    let pending = registry.create_clock(ClockOptions::new(SyncMode::Automatic).with_id("pending"));
    let sub = pending.create_sub_clock("fx").unwrap();
    assert_eq!(sub.sync(), ClockSync::Stopped);

    running.unify(&pending).unwrap();

    assert_eq!(running.sub_clocks(), vec![sub.clone()]);
    assert_eq!(sub.sync(), ClockSync::Passive);
}

#[test]
fn test_clocks_with_parents_are_not_merged() {
    let (registry, _time) = manual_registry(ClockSettings::default());
    let left = registry.create_clock(ClockOptions::new(SyncMode::Cpu).with_id("left"));
    let right = registry.create_clock(ClockOptions::new(SyncMode::Cpu).with_id("right"));
    let a = left.create_sub_clock("fx").unwrap();
    let b = right.create_sub_clock("fx").unwrap();

    assert!(matches!(a.unify(&b), Err(StreamError::ClockConflict { .. })));
}
