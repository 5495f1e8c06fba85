// Stepflow Library - Linear Resumable Workflow Core
// This exposes the core components for embedding and testing

pub mod config;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use config::{config, init_config, StepflowConfig};
pub use store::{FileStore, MemoryStore, StateStore, StoreError};
pub use telemetry::{
    create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry,
};
pub use workflow::{
    machine_from_config, DefinitionError, FieldError, SessionError, SnapshotError, StepId,
    StepRegistry, StepRenderer, SubmitOutcome, TransitionKind, TransitionRecord,
    WorkflowDefinition, WorkflowError, WorkflowInstance, WorkflowMachine, WorkflowNotice,
    WorkflowSession, WorkflowSnapshot, WorkflowStatusReport, SNAPSHOT_VERSION,
};
