use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::store::StateStore;

use super::definition::{StepId, WorkflowDefinition};
use super::instance::{WorkflowInstance, WorkflowSnapshot};

/// Errors reported to callers of transition operations. Nothing here is
/// fatal: an invalid jump leaves the instance untouched and the UI shows a
/// message or ignores the gesture.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("step '{step}' is not reachable from '{current}' without completing the steps before it")]
    InvalidStep { step: StepId, current: StepId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    Advance,
    Retreat,
    Jump,
}

/// Session-scoped audit record of one applied transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_step: StepId,
    pub to_step: StepId,
    pub kind: TransitionKind,
    pub at: DateTime<Utc>,
}

/// Non-blocking notices queued for the UI. Losing in-progress data is
/// preferable to crashing, but the user must be told when it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowNotice {
    /// A persisted snapshot could not be used and was discarded.
    RecoveredFromCorruption {
        workflow_key: String,
        reason: String,
    },
    /// A store write failed; progress is held in memory only from now on.
    ProgressNotSaved {
        workflow_key: String,
        reason: String,
    },
}

/// Point-in-time summary for progress indicators and monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatusReport {
    pub workflow: String,
    pub current_step: StepId,
    pub completed_count: usize,
    pub total_steps: usize,
    pub progress: f64,
    pub complete: bool,
    pub degraded: bool,
    pub transitions_count: usize,
    pub last_transition: Option<DateTime<Utc>>,
}

const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Linear resumable workflow state machine.
///
/// Owns all mutation of a [`WorkflowInstance`] and persists a snapshot
/// through the store after every transition. Store failures never
/// propagate: reads fail open to a fresh instance, and a failed write drops
/// the machine into in-memory-only operation for the rest of the session.
pub struct WorkflowMachine {
    definition: WorkflowDefinition,
    store: Box<dyn StateStore>,
    degraded: bool,
    notices: Vec<WorkflowNotice>,
    history: Vec<TransitionRecord>,
    history_limit: usize,
}

impl std::fmt::Debug for WorkflowMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowMachine")
            .field("definition", &self.definition)
            .field("degraded", &self.degraded)
            .field("notices", &self.notices)
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl WorkflowMachine {
    pub fn new(definition: WorkflowDefinition, store: Box<dyn StateStore>) -> Self {
        Self {
            definition,
            store,
            degraded: false,
            notices: Vec::new(),
            history: Vec::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// True once a store write has failed this session; progress is then
    /// held in memory only.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Drain queued notices for the UI to surface.
    pub fn take_notices(&mut self) -> Vec<WorkflowNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Read the persisted snapshot for `workflow_key`, or hand back a fresh
    /// instance at the first step. Never fails: absence is the normal
    /// first-visit case, and an unusable snapshot is discarded with a
    /// [`WorkflowNotice::RecoveredFromCorruption`] queued.
    pub async fn load(&mut self, workflow_key: &str) -> WorkflowInstance {
        let Some(raw) = self.store.get(workflow_key).await else {
            info!(
                workflow = %self.definition.name(),
                workflow_key,
                "no persisted snapshot, starting fresh"
            );
            return WorkflowInstance::fresh(workflow_key, &self.definition);
        };

        let restored = WorkflowSnapshot::decode(&raw)
            .and_then(|snapshot| snapshot.into_instance(workflow_key, &self.definition));

        match restored {
            Ok(instance) => {
                info!(
                    workflow = %self.definition.name(),
                    workflow_key,
                    current_step = %instance.current_step,
                    completed = instance.completed_steps.len(),
                    "resumed from persisted snapshot"
                );
                instance
            }
            Err(err) => {
                warn!(
                    workflow = %self.definition.name(),
                    workflow_key,
                    error = %err,
                    "discarding unusable snapshot, starting fresh"
                );
                self.notices.push(WorkflowNotice::RecoveredFromCorruption {
                    workflow_key: workflow_key.to_string(),
                    reason: err.to_string(),
                });
                if let Err(delete_err) = self.store.delete(workflow_key).await {
                    debug!(workflow_key, error = %delete_err, "could not remove bad snapshot");
                }
                WorkflowInstance::fresh(workflow_key, &self.definition)
            }
        }
    }

    /// Mark the current step completed, merge `step_output` into the
    /// payload, and move to the next step in order. At the last step the
    /// position is pinned and the instance becomes complete. Re-entry of an
    /// already-completed step is allowed and re-records its output.
    ///
    /// The caller has already validated `step_output` against step-specific
    /// rules; validation never lives in the machine.
    pub async fn advance(&mut self, instance: &mut WorkflowInstance, step_output: Value) -> StepId {
        let from = instance.current_step.clone();

        instance.completed_steps.insert(from.clone());
        if !step_output.is_null() {
            instance.payload.insert(from.clone(), step_output);
        }

        if let Some(next) = self.definition.next_after(&from) {
            instance.current_step = next.clone();
        } else {
            debug!(
                workflow_key = %instance.workflow_key,
                step = %from,
                "advance at the last step, position unchanged"
            );
        }

        self.record_transition(&from, &instance.current_step, TransitionKind::Advance);
        self.persist(instance).await;
        instance.current_step.clone()
    }

    /// Move to the previous step in order; a no-op on the first step.
    /// Previously completed steps stay completed when revisited.
    pub async fn retreat(&mut self, instance: &mut WorkflowInstance) -> StepId {
        let from = instance.current_step.clone();

        match self.definition.prev_before(&from) {
            Some(prev) => {
                instance.current_step = prev.clone();
                self.record_transition(&from, &instance.current_step, TransitionKind::Retreat);
                self.persist(instance).await;
            }
            None => {
                debug!(
                    workflow_key = %instance.workflow_key,
                    step = %from,
                    "retreat at the first step is a no-op"
                );
            }
        }

        instance.current_step.clone()
    }

    /// Jump directly to `target`, which must be either already completed or
    /// the immediate successor of the highest completed step. Forward jumps
    /// past unvalidated steps are rejected and leave the instance unchanged.
    pub async fn jump_to(
        &mut self,
        instance: &mut WorkflowInstance,
        target: &StepId,
    ) -> Result<StepId, WorkflowError> {
        if !self.definition.contains(target) || !self.is_reachable(instance, target) {
            info!(
                workflow_key = %instance.workflow_key,
                target = %target,
                current = %instance.current_step,
                "rejected jump past incomplete steps"
            );
            return Err(WorkflowError::InvalidStep {
                step: target.clone(),
                current: instance.current_step.clone(),
            });
        }

        let from = instance.current_step.clone();
        if from != *target {
            instance.current_step = target.clone();
            self.record_transition(&from, target, TransitionKind::Jump);
            self.persist(instance).await;
        }

        Ok(instance.current_step.clone())
    }

    /// Delete the persisted snapshot for `workflow_key`; a subsequent
    /// [`Self::load`] starts fresh. Store failures are logged, not
    /// propagated; the next load fails open anyway.
    pub async fn reset(&mut self, workflow_key: &str) {
        match self.store.delete(workflow_key).await {
            Ok(()) => {
                info!(
                    workflow = %self.definition.name(),
                    workflow_key,
                    "workflow state reset"
                );
            }
            Err(err) => {
                warn!(
                    workflow_key,
                    error = %err,
                    "failed to delete persisted snapshot during reset"
                );
            }
        }
    }

    /// Fraction of definition steps completed, in `[0, 1]`.
    pub fn progress_fraction(&self, instance: &WorkflowInstance) -> f64 {
        let completed = instance
            .completed_steps
            .iter()
            .filter(|step| self.definition.contains(step))
            .count();
        completed as f64 / self.definition.len() as f64
    }

    /// The last step has been completed; no advance transition exists from
    /// here and the caller is expected to hand off to its next flow.
    pub fn is_complete(&self, instance: &WorkflowInstance) -> bool {
        instance.completed_steps.contains(self.definition.last_step())
    }

    pub fn status_report(&self, instance: &WorkflowInstance) -> WorkflowStatusReport {
        WorkflowStatusReport {
            workflow: self.definition.name().to_string(),
            current_step: instance.current_step.clone(),
            completed_count: instance.completed_steps.len(),
            total_steps: self.definition.len(),
            progress: self.progress_fraction(instance),
            complete: self.is_complete(instance),
            degraded: self.degraded,
            transitions_count: self.history.len(),
            last_transition: self.history.last().map(|record| record.at),
        }
    }

    /// `target` is reachable if already completed, or if it is the step
    /// right after the furthest completed one (the "frontier"). A fresh
    /// instance's frontier is the first step.
    fn is_reachable(&self, instance: &WorkflowInstance, target: &StepId) -> bool {
        instance.completed_steps.contains(target) || self.frontier_step(instance) == target
    }

    fn frontier_step(&self, instance: &WorkflowInstance) -> &StepId {
        let highest_completed = self
            .definition
            .steps()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, step)| instance.completed_steps.contains(step));

        match highest_completed {
            None => self.definition.first_step(),
            Some((_, step)) => self.definition.next_after(step).unwrap_or(step),
        }
    }

    fn record_transition(&mut self, from: &StepId, to: &StepId, kind: TransitionKind) {
        let record = TransitionRecord {
            from_step: from.clone(),
            to_step: to.clone(),
            kind,
            at: Utc::now(),
        };

        info!(
            workflow = %self.definition.name(),
            from_step = %record.from_step,
            to_step = %record.to_step,
            kind = ?record.kind,
            "workflow transition"
        );

        self.history.push(record);
        if self.history.len() > self.history_limit {
            let excess = self.history.len() - self.history_limit;
            self.history.drain(0..excess);
        }
    }

    async fn persist(&mut self, instance: &WorkflowInstance) {
        if self.degraded {
            debug!(
                workflow_key = %instance.workflow_key,
                "degraded mode, skipping snapshot write"
            );
            return;
        }

        let snapshot = WorkflowSnapshot::from_instance(instance);
        let encoded = match snapshot.encode() {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(
                    workflow_key = %instance.workflow_key,
                    error = %err,
                    "snapshot could not be serialized, continuing in memory only"
                );
                self.enter_degraded(&instance.workflow_key, err.to_string());
                return;
            }
        };

        if let Err(err) = self.store.set(&instance.workflow_key, &encoded).await {
            error!(
                workflow_key = %instance.workflow_key,
                error = %err,
                "snapshot write failed, continuing in memory only"
            );
            self.enter_degraded(&instance.workflow_key, err.to_string());
        }
    }

    fn enter_degraded(&mut self, workflow_key: &str, reason: String) {
        if !self.degraded {
            self.degraded = true;
            self.notices.push(WorkflowNotice::ProgressNotSaved {
                workflow_key: workflow_key.to_string(),
                reason,
            });
        }
    }
}
