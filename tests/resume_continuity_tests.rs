//! Resume-after-reload tests against the file-backed store
//!
//! Exercises the persistence contract end to end: snapshots survive across
//! machine instances, corrupt or stale snapshots fall back to a fresh
//! instance with a queued notice, and the on-disk layout stays stable.

use serde_json::json;
use tempfile::TempDir;

use stepflow::{
    FileStore, StepId, WorkflowDefinition, WorkflowMachine, WorkflowNotice, SNAPSHOT_VERSION,
};

fn definition() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "loan-application",
        vec!["income".into(), "documents".into(), "review".into()],
    )
    .unwrap()
}

fn file_machine(dir: &TempDir) -> WorkflowMachine {
    WorkflowMachine::new(definition(), Box::new(FileStore::new(dir.path())))
}

fn state_file(dir: &TempDir, key: &str) -> std::path::PathBuf {
    dir.path().join(format!("{key}.state.json"))
}

#[tokio::test]
async fn resume_across_machine_instances_restores_position_and_payload() {
    let dir = TempDir::new().unwrap();

    {
        let mut machine = file_machine(&dir);
        let mut instance = machine.load("app-77").await;
        machine
            .advance(&mut instance, json!({ "annual": 92_500 }))
            .await;
        machine
            .advance(&mut instance, json!({ "files": ["w2.pdf", "bank.pdf"] }))
            .await;
    }

    // A brand-new machine over the same directory picks up where the user
    // left off.
    let mut machine = file_machine(&dir);
    let resumed = machine.load("app-77").await;

    assert_eq!(resumed.current_step, StepId::from("review"));
    assert!(resumed.has_completed(&"income".into()));
    assert!(resumed.has_completed(&"documents".into()));
    assert_eq!(
        resumed.step_payload(&"income".into()),
        Some(&json!({ "annual": 92_500 }))
    );
    assert!(machine.take_notices().is_empty());
}

#[tokio::test]
async fn corrupt_state_file_falls_back_to_fresh_with_notice() {
    let dir = TempDir::new().unwrap();
    std::fs::write(state_file(&dir, "app-77"), "{definitely not json").unwrap();

    let mut machine = file_machine(&dir);
    let instance = machine.load("app-77").await;

    assert_eq!(instance.current_step, StepId::from("income"));
    assert!(instance.completed_steps.is_empty());

    let notices = machine.take_notices();
    assert!(matches!(
        notices.as_slice(),
        [WorkflowNotice::RecoveredFromCorruption { workflow_key, .. }] if workflow_key == "app-77"
    ));

    // The unusable file is gone, so the notice is one-time.
    assert!(!state_file(&dir, "app-77").exists());
    let mut machine = file_machine(&dir);
    machine.load("app-77").await;
    assert!(machine.take_notices().is_empty());
}

#[tokio::test]
async fn snapshot_version_mismatch_is_discarded() {
    let dir = TempDir::new().unwrap();
    let stale = json!({
        "version": SNAPSHOT_VERSION + 1,
        "current_step": "documents",
        "completed_steps": ["income"],
        "payload": {},
        "saved_at": "2026-01-05T10:00:00Z",
    });
    std::fs::write(state_file(&dir, "app-77"), stale.to_string()).unwrap();

    let mut machine = file_machine(&dir);
    let instance = machine.load("app-77").await;

    assert_eq!(instance.current_step, StepId::from("income"));
    assert!(matches!(
        machine.take_notices().as_slice(),
        [WorkflowNotice::RecoveredFromCorruption { .. }]
    ));
}

#[tokio::test]
async fn snapshot_for_a_changed_definition_is_discarded() {
    let dir = TempDir::new().unwrap();
    // A snapshot written by an older release whose step list no longer
    // matches the shipped definition.
    let stale = json!({
        "version": SNAPSHOT_VERSION,
        "current_step": "credit-check",
        "completed_steps": ["income"],
        "payload": {},
        "saved_at": "2026-01-05T10:00:00Z",
    });
    std::fs::write(state_file(&dir, "app-77"), stale.to_string()).unwrap();

    let mut machine = file_machine(&dir);
    let instance = machine.load("app-77").await;

    assert_eq!(instance.current_step, StepId::from("income"));
    assert!(matches!(
        machine.take_notices().as_slice(),
        [WorkflowNotice::RecoveredFromCorruption { .. }]
    ));
}

#[tokio::test]
async fn reset_deletes_the_state_file() {
    let dir = TempDir::new().unwrap();
    let mut machine = file_machine(&dir);
    let mut instance = machine.load("app-77").await;

    machine.advance(&mut instance, json!({})).await;
    assert!(state_file(&dir, "app-77").exists());

    machine.reset("app-77").await;
    assert!(!state_file(&dir, "app-77").exists());

    let fresh = machine.load("app-77").await;
    assert_eq!(fresh.current_step, StepId::from("income"));
}

#[tokio::test]
async fn state_file_layout_matches_the_documented_contract() {
    let dir = TempDir::new().unwrap();
    let mut machine = file_machine(&dir);
    let mut instance = machine.load("app-77").await;

    machine
        .advance(&mut instance, json!({ "annual": 92_500 }))
        .await;

    let raw = std::fs::read_to_string(state_file(&dir, "app-77")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(parsed["version"], json!(SNAPSHOT_VERSION));
    assert_eq!(parsed["current_step"], json!("documents"));
    assert_eq!(parsed["completed_steps"], json!(["income"]));
    assert_eq!(parsed["payload"]["income"], json!({ "annual": 92_500 }));
    assert!(parsed["saved_at"].is_string());
}

#[tokio::test]
async fn missing_state_directory_is_a_normal_miss() {
    let dir = TempDir::new().unwrap();
    let mut machine = WorkflowMachine::new(
        definition(),
        Box::new(FileStore::new(dir.path().join("never-created"))),
    );

    let instance = machine.load("app-77").await;

    assert_eq!(instance.current_step, StepId::from("income"));
    assert!(machine.take_notices().is_empty());
    assert!(!machine.is_degraded());
}
