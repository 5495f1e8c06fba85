use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::definition::StepId;
use super::instance::WorkflowInstance;
use super::machine::{WorkflowError, WorkflowMachine, WorkflowNotice, WorkflowStatusReport};
use super::renderer::{FieldError, StepRegistry};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("workflow '{workflow}' has steps with no registered renderer: {steps:?}")]
    MissingRenderers { workflow: String, steps: Vec<StepId> },
}

/// Result of submitting input for the current step.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Input validated; the instance moved to `step`.
    Advanced { step: StepId },
    /// Input validated and the last step is now complete; hand off to the
    /// next flow.
    Complete,
    /// Input rejected by the step's renderer; the instance is unchanged.
    Rejected { field_errors: Vec<FieldError> },
}

/// Drives one user's traversal: renderers validate, the machine transitions.
///
/// This is the seam a UI embeds. It keeps transition legality centrally
/// enforced instead of duplicated per page, and owns the loaded instance
/// for the lifetime of the interaction.
pub struct WorkflowSession {
    machine: WorkflowMachine,
    registry: StepRegistry,
    instance: WorkflowInstance,
}

impl WorkflowSession {
    /// Load (or freshly create) the instance for `workflow_key` and wrap it
    /// in a session. Every definition step must have a renderer registered.
    pub async fn start(
        mut machine: WorkflowMachine,
        registry: StepRegistry,
        workflow_key: &str,
    ) -> Result<Self, SessionError> {
        let missing = registry.missing_renderers(machine.definition());
        if !missing.is_empty() {
            return Err(SessionError::MissingRenderers {
                workflow: machine.definition().name().to_string(),
                steps: missing,
            });
        }

        let instance = machine.load(workflow_key).await;
        Ok(Self {
            machine,
            registry,
            instance,
        })
    }

    pub fn current_step(&self) -> &StepId {
        &self.instance.current_step
    }

    pub fn instance(&self) -> &WorkflowInstance {
        &self.instance
    }

    /// Previously collected data for the current step, for pre-filling the
    /// form on resume or revisit.
    pub fn resume_payload(&self) -> Option<&Value> {
        self.instance.step_payload(&self.instance.current_step)
    }

    /// Validate `input` against the current step's renderer and advance on
    /// success.
    pub async fn submit(&mut self, input: Value) -> SubmitOutcome {
        let step = self.instance.current_step.clone();

        let Some(renderer) = self.registry.renderer_for(&step) else {
            // Coverage is checked at start; this only fires if the registry
            // and definition were swapped out from under the session.
            warn!(step = %step, "no renderer registered for current step");
            return SubmitOutcome::Rejected {
                field_errors: vec![FieldError::new(
                    "",
                    format!("step '{step}' has no registered renderer"),
                )],
            };
        };

        match renderer.validate(&input).await {
            Err(field_errors) => {
                info!(
                    step = %step,
                    errors = field_errors.len(),
                    "step input rejected by validation"
                );
                SubmitOutcome::Rejected { field_errors }
            }
            Ok(data) => {
                let landed = self.machine.advance(&mut self.instance, data).await;
                if self.machine.is_complete(&self.instance) {
                    SubmitOutcome::Complete
                } else {
                    SubmitOutcome::Advanced { step: landed }
                }
            }
        }
    }

    /// Move back one step; a no-op on the first step.
    pub async fn back(&mut self) -> StepId {
        self.machine.retreat(&mut self.instance).await
    }

    /// Jump to a completed step (or the frontier). Illegal targets return
    /// [`WorkflowError::InvalidStep`] and change nothing.
    pub async fn goto(&mut self, target: &StepId) -> Result<StepId, WorkflowError> {
        self.machine.jump_to(&mut self.instance, target).await
    }

    pub fn progress(&self) -> f64 {
        self.machine.progress_fraction(&self.instance)
    }

    pub fn is_complete(&self) -> bool {
        self.machine.is_complete(&self.instance)
    }

    pub fn status(&self) -> WorkflowStatusReport {
        self.machine.status_report(&self.instance)
    }

    pub fn take_notices(&mut self) -> Vec<WorkflowNotice> {
        self.machine.take_notices()
    }

    /// Discard persisted and in-memory state and start over at the first
    /// step.
    pub async fn reset(&mut self) -> &StepId {
        let workflow_key = self.instance.workflow_key.clone();
        self.machine.reset(&workflow_key).await;
        self.instance = self.machine.load(&workflow_key).await;
        &self.instance.current_step
    }
}
