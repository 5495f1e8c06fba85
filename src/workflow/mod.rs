//! Linear resumable workflow core
//!
//! This module provides the ordered-step state machine behind multi-step
//! application flows: a current step, a monotonic set of completed steps,
//! per-step payload data, and a snapshot persisted through a pluggable
//! key-value store after every transition.
//!
//! # Architecture
//!
//! - **Definition**: the immutable ordered list of steps
//! - **Instance**: one user's traversal state, plus its persisted snapshot
//! - **Machine**: transition operations (`advance`, `retreat`, `jump_to`,
//!   `reset`) with fail-open persistence
//! - **Renderer/Registry**: per-step validation contract, kept out of the
//!   machine
//! - **Session**: the render → validate → advance driver a UI embeds
//!
//! # Key properties
//!
//! - Resumable after reload from the persisted snapshot
//! - Forward jumps past unvalidated steps are rejected centrally
//! - Store failures degrade to in-memory operation with a queued notice,
//!   never a crash

pub mod definition;
pub mod instance;
pub mod machine;
pub mod renderer;
pub mod session;

pub use definition::{DefinitionError, StepId, WorkflowDefinition};
pub use instance::{SnapshotError, WorkflowInstance, WorkflowSnapshot, SNAPSHOT_VERSION};
pub use machine::{
    TransitionKind, TransitionRecord, WorkflowError, WorkflowMachine, WorkflowNotice,
    WorkflowStatusReport,
};
pub use renderer::{FieldError, StepRegistry, StepRenderer};
pub use session::{SessionError, SubmitOutcome, WorkflowSession};

use crate::store::{FileStore, MemoryStore, StateStore};

/// Build a machine wired from the global configuration: a file-backed store
/// under the configured state directory (or memory-only when persistence is
/// disabled) and the configured transition-history cap.
pub fn machine_from_config(definition: WorkflowDefinition) -> anyhow::Result<WorkflowMachine> {
    let cfg = crate::config::config()?;

    let store: Box<dyn StateStore> = if cfg.persistence.enable_persistence {
        Box::new(FileStore::new(&cfg.persistence.state_directory))
    } else {
        Box::new(MemoryStore::new())
    };

    Ok(WorkflowMachine::new(definition, store)
        .with_history_limit(cfg.workflow.max_transition_history))
}
