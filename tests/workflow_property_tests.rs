//! Property tests for traversal invariants
//!
//! Random operation sequences against random-width definitions must never
//! shrink the completed set, move the current step outside the definition,
//! or break snapshot round-trip fidelity.

use proptest::prelude::*;
use serde_json::json;

use stepflow::{
    MemoryStore, StepId, WorkflowDefinition, WorkflowInstance, WorkflowMachine, WorkflowSnapshot,
};

#[derive(Debug, Clone)]
enum Op {
    Advance,
    Retreat,
    Jump(usize),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            3 => Just(Op::Advance),
            2 => Just(Op::Retreat),
            2 => (0usize..10).prop_map(Op::Jump),
        ],
        0..40,
    )
}

fn definition(width: usize) -> WorkflowDefinition {
    let steps = (0..width)
        .map(|i| StepId::from(format!("s{i}")))
        .collect::<Vec<_>>();
    WorkflowDefinition::new("prop", steps).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn apply(
    machine: &mut WorkflowMachine,
    instance: &mut WorkflowInstance,
    op: &Op,
) {
    match op {
        Op::Advance => {
            machine.advance(instance, json!({})).await;
        }
        Op::Retreat => {
            machine.retreat(instance).await;
        }
        Op::Jump(idx) => {
            let target = StepId::from(format!("s{idx}"));
            let before = instance.clone();
            if machine.jump_to(instance, &target).await.is_err() {
                assert_eq!(*instance, before, "rejected jump must change nothing");
            }
        }
    }
}

proptest! {
    #[test]
    fn repeated_advances_visit_steps_in_order_exactly_once(width in 1usize..8) {
        runtime().block_on(async {
            let def = definition(width);
            let mut machine = WorkflowMachine::new(def.clone(), Box::new(MemoryStore::new()));
            let mut instance = machine.load("prop").await;

            for expected_idx in 1..width {
                let landed = machine.advance(&mut instance, json!({})).await;
                assert_eq!(landed, def.steps()[expected_idx]);
            }

            // The final advance completes the last step without moving.
            let landed = machine.advance(&mut instance, json!({})).await;
            assert_eq!(&landed, def.last_step());
            assert!(machine.is_complete(&instance));
            assert_eq!(machine.progress_fraction(&instance), 1.0);
            assert_eq!(instance.completed_steps.len(), width);
        });
    }

    #[test]
    fn traversal_invariants_hold_under_arbitrary_operations(
        width in 1usize..8,
        ops in ops_strategy(),
    ) {
        runtime().block_on(async {
            let def = definition(width);
            let mut machine = WorkflowMachine::new(def.clone(), Box::new(MemoryStore::new()));
            let mut instance = machine.load("prop").await;

            let mut prev_completed = instance.completed_steps.clone();
            let mut prev_progress = machine.progress_fraction(&instance);

            for op in &ops {
                apply(&mut machine, &mut instance, op).await;

                assert!(
                    def.contains(&instance.current_step),
                    "current step must stay within the definition"
                );
                assert!(
                    instance.completed_steps.is_superset(&prev_completed),
                    "completed set must never shrink"
                );
                assert!(
                    instance
                        .completed_steps
                        .iter()
                        .all(|step| def.contains(step)),
                    "completed set must stay a subset of the definition"
                );

                let progress = machine.progress_fraction(&instance);
                assert!((0.0..=1.0).contains(&progress));
                assert!(progress >= prev_progress, "progress must be monotone");

                prev_completed = instance.completed_steps.clone();
                prev_progress = progress;
            }
        });
    }

    #[test]
    fn snapshots_round_trip_for_any_reachable_instance(
        width in 1usize..8,
        ops in ops_strategy(),
    ) {
        runtime().block_on(async {
            let def = definition(width);
            let mut machine = WorkflowMachine::new(def.clone(), Box::new(MemoryStore::new()));
            let mut instance = machine.load("prop").await;

            for op in &ops {
                apply(&mut machine, &mut instance, op).await;
            }

            let encoded = WorkflowSnapshot::from_instance(&instance).encode().unwrap();
            let restored = WorkflowSnapshot::decode(&encoded)
                .unwrap()
                .into_instance("prop", &def)
                .unwrap();

            assert_eq!(restored, instance);
        });
    }

    #[test]
    fn jumps_beyond_the_frontier_are_always_rejected(
        width in 2usize..8,
        completed_count in 0usize..6,
    ) {
        runtime().block_on(async {
            let completed_count = completed_count.min(width.saturating_sub(2));
            let def = definition(width);
            let mut machine = WorkflowMachine::new(def.clone(), Box::new(MemoryStore::new()));
            let mut instance = machine.load("prop").await;

            for _ in 0..completed_count {
                machine.advance(&mut instance, json!({})).await;
            }

            // Every step past the immediate successor of the highest
            // completed step must be unreachable.
            for target_idx in (completed_count + 1)..width {
                let target = def.steps()[target_idx].clone();
                let before = instance.clone();
                let result = machine.jump_to(&mut instance, &target).await;
                assert!(result.is_err(), "jump to {target} should be rejected");
                assert_eq!(instance, before);
            }
        });
    }
}
