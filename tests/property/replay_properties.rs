// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Query Model Replay
//!
//! The engine's result must equal a plain left fold of the entity's own
//! handled events, whatever the snapshot position and whatever foreign
//! events are mixed into the stream.

use proptest::prelude::*;
use std::sync::Arc;

use crate::fixtures::{
    archived, assigned, engine, unassigned, Allocation, EMPLOYEE_1, EMPLOYEE_2, NOW,
};
use cim_query_model::{InMemoryEventSource, InMemorySnapshotStore, Snapshot};

// ============================================================================
// Test History Definition
// ============================================================================

const PROJECTS: [&str; 4] = ["project-a", "project-b", "project-c", "project-d"];

/// One step of an employee's allocation history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Assign(usize),
    Unassign(usize),
}

/// Noise interleaved into a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Noise {
    Archived(usize),
    OtherEmployee(usize),
}

/// Reference fold of a history
fn fold(initial: Allocation, steps: &[Step]) -> Allocation {
    steps.iter().fold(initial, |mut state, step| {
        match *step {
            Step::Assign(p) => state.project_ids.push(PROJECTS[p].to_string()),
            Step::Unassign(p) => state.project_ids.retain(|id| id != PROJECTS[p]),
        }
        state
    })
}

/// Drop assignments to a project the employee is already on
///
/// The allocation model rejects those, and these properties are about
/// successful replays.
fn valid_history(steps: Vec<Step>) -> Vec<Step> {
    let mut on = [false; PROJECTS.len()];
    steps
        .into_iter()
        .filter(|step| match *step {
            Step::Assign(p) if on[p] => false,
            Step::Assign(p) => {
                on[p] = true;
                true
            }
            Step::Unassign(p) => {
                on[p] = false;
                true
            }
        })
        .collect()
}

fn record_step(source: &InMemoryEventSource, version: i64, step: Step) {
    let result = match step {
        Step::Assign(p) => source.record(EMPLOYEE_1, version, assigned(PROJECTS[p], EMPLOYEE_1)),
        Step::Unassign(p) => {
            source.record(EMPLOYEE_1, version, unassigned(PROJECTS[p], EMPLOYEE_1))
        }
    };
    result.unwrap();
}

fn record_noise(source: &InMemoryEventSource, version: i64, noise: Noise) {
    let result = match noise {
        Noise::Archived(p) => source.record(EMPLOYEE_1, version, archived(PROJECTS[p])),
        Noise::OtherEmployee(p) => {
            source.record(EMPLOYEE_1, version, assigned(PROJECTS[p], EMPLOYEE_2))
        }
    };
    result.unwrap();
}

/// Record a history at versions 1..=n
fn source_with(steps: &[Step]) -> Arc<InMemoryEventSource> {
    let source = Arc::new(InMemoryEventSource::new());
    for (i, step) in steps.iter().enumerate() {
        record_step(&source, i as i64 + 1, *step);
    }
    source
}

// ============================================================================
// Property Test Strategies
// ============================================================================

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..PROJECTS.len()).prop_map(Step::Assign),
        (0..PROJECTS.len()).prop_map(Step::Unassign),
    ]
}

fn noise() -> impl Strategy<Value = Noise> {
    prop_oneof![
        (0..PROJECTS.len()).prop_map(Noise::Archived),
        (0..PROJECTS.len()).prop_map(Noise::OtherEmployee),
    ]
}

fn history() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(step(), 0..40).prop_map(valid_history)
}

/// A history and a split point inside it
fn history_and_split() -> impl Strategy<Value = (Vec<Step>, usize)> {
    history().prop_flat_map(|steps| {
        let len = steps.len();
        (Just(steps), 0..=len)
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Property: Replay equals the reference fold
    #[test]
    fn prop_replay_matches_fold(steps in history()) {
        let state = tokio_test::block_on(async {
            engine(Arc::new(InMemorySnapshotStore::new()), source_with(&steps))
                .get_state(EMPLOYEE_1)
                .await
                .unwrap()
        });

        prop_assert_eq!(state, fold(Allocation::default(), &steps));
    }

    /// Property: Snapshots are a resume point, never a different answer
    ///
    /// Resuming from the fold of any prefix, stored at that prefix's last
    /// version, gives the same state as folding the whole history.
    #[test]
    fn prop_snapshot_resume_matches_full_fold((steps, split) in history_and_split()) {
        let prefix_state = fold(Allocation::default(), &steps[..split]);
        let store = Arc::new(InMemorySnapshotStore::with_snapshot(
            EMPLOYEE_1,
            Snapshot::new(prefix_state, split as i64),
        ));

        let projected = tokio_test::block_on(async {
            engine(store, source_with(&steps))
                .project(EMPLOYEE_1)
                .await
                .unwrap()
        });

        prop_assert_eq!(projected.events_applied, (steps.len() - split) as u64);
        prop_assert_eq!(projected.state, fold(Allocation::default(), &steps));
    }

    /// Property: Replay is idempotent
    ///
    /// The first replay snapshots at the engine clock; the second resumes
    /// from that snapshot and must agree.
    #[test]
    fn prop_replay_is_idempotent(steps in history()) {
        let store = Arc::new(InMemorySnapshotStore::new());
        let engine = engine(store, source_with(&steps));

        let (first, second) = tokio_test::block_on(async {
            let first = engine.project(EMPLOYEE_1).await.unwrap();
            let second = engine.project(EMPLOYEE_1).await.unwrap();
            (first, second)
        });

        prop_assert_eq!(second.from_version, NOW);
        prop_assert_eq!(second.events_applied, 0);
        prop_assert_eq!(first.state, second.state);
    }

    /// Property: Unhandled and foreign events have no effect
    #[test]
    fn prop_noise_has_no_effect(
        steps in history(),
        noise in prop::collection::vec(prop::option::of(noise()), 0..40),
    ) {
        let source = Arc::new(InMemoryEventSource::new());
        let mut version = 0;
        let mut noise = noise.into_iter();
        for step in &steps {
            if let Some(Some(n)) = noise.next() {
                version += 1;
                record_noise(&source, version, n);
            }
            version += 1;
            record_step(&source, version, *step);
        }
        for n in noise.flatten() {
            version += 1;
            record_noise(&source, version, n);
        }

        let projected = tokio_test::block_on(async {
            engine(Arc::new(InMemorySnapshotStore::new()), source)
                .project(EMPLOYEE_1)
                .await
                .unwrap()
        });

        prop_assert_eq!(projected.events_applied, steps.len() as u64);
        prop_assert_eq!(projected.state, fold(Allocation::default(), &steps));
    }
}
