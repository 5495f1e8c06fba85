use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::definition::{StepId, WorkflowDefinition};

/// Schema tag written into every persisted snapshot. Bump when the snapshot
/// layout changes; a mismatch on load is treated as corrupt state.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Runtime state of one user's traversal through a workflow.
///
/// Mutated exclusively by [`super::machine::WorkflowMachine`] transition
/// operations; renderers hold a read-mostly reference for the duration of a
/// render cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Namespacing identifier for persisted state (e.g. an application id).
    pub workflow_key: String,
    /// The step the user is presently on. Always a member of the owning
    /// definition.
    pub current_step: StepId,
    /// Steps finished at least once. Monotonic: entries are only removed by
    /// an explicit reset.
    pub completed_steps: BTreeSet<StepId>,
    /// Step-collected data keyed by the step that produced it.
    pub payload: BTreeMap<StepId, Value>,
}

impl WorkflowInstance {
    /// A brand-new instance positioned at the first step of `definition`.
    pub fn fresh(workflow_key: impl Into<String>, definition: &WorkflowDefinition) -> Self {
        Self {
            workflow_key: workflow_key.into(),
            current_step: definition.first_step().clone(),
            completed_steps: BTreeSet::new(),
            payload: BTreeMap::new(),
        }
    }

    pub fn has_completed(&self, step: &StepId) -> bool {
        self.completed_steps.contains(step)
    }

    /// Data previously collected for `step`, used by renderers when resuming.
    pub fn step_payload(&self, step: &StepId) -> Option<&Value> {
        self.payload.get(step)
    }
}

/// Reasons a persisted snapshot was rejected at load time. All of these are
/// recovered by discarding the snapshot and starting fresh.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("snapshot version {found} is not the supported version {expected}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("snapshot current step '{step}' is not part of workflow '{workflow}'")]
    UnknownCurrentStep { workflow: String, step: StepId },

    #[error("snapshot completed step '{step}' is not part of workflow '{workflow}'")]
    UnknownCompletedStep { workflow: String, step: StepId },
}

/// Persisted form of a [`WorkflowInstance`]: one store entry per
/// `workflow_key`, value is this struct as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub version: u32,
    pub current_step: StepId,
    pub completed_steps: Vec<StepId>,
    pub payload: BTreeMap<StepId, Value>,
    pub saved_at: DateTime<Utc>,
}

impl WorkflowSnapshot {
    pub fn from_instance(instance: &WorkflowInstance) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            current_step: instance.current_step.clone(),
            completed_steps: instance.completed_steps.iter().cloned().collect(),
            payload: instance.payload.clone(),
            saved_at: Utc::now(),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Rehydrate an instance, checking the snapshot against the definition it
    /// claims to belong to. Any disagreement rejects the whole snapshot.
    pub fn into_instance(
        self,
        workflow_key: impl Into<String>,
        definition: &WorkflowDefinition,
    ) -> Result<WorkflowInstance, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: self.version,
            });
        }

        if !definition.contains(&self.current_step) {
            return Err(SnapshotError::UnknownCurrentStep {
                workflow: definition.name().to_string(),
                step: self.current_step,
            });
        }

        if let Some(step) = self
            .completed_steps
            .iter()
            .find(|step| !definition.contains(step))
        {
            return Err(SnapshotError::UnknownCompletedStep {
                workflow: definition.name().to_string(),
                step: step.clone(),
            });
        }

        Ok(WorkflowInstance {
            workflow_key: workflow_key.into(),
            current_step: self.current_step,
            completed_steps: self.completed_steps.into_iter().collect(),
            payload: self.payload,
        })
    }
}
