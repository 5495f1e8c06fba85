use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier for a single step within a workflow definition.
///
/// Step ids are plain string tags ("income", "documents", "review") chosen by
/// the embedding application; the definition gives them their ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StepId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for StepId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Errors raised while constructing a workflow definition
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("workflow '{workflow}' declares no steps")]
    EmptyDefinition { workflow: String },

    #[error("workflow '{workflow}' declares step '{step}' more than once")]
    DuplicateStep { workflow: String, step: StepId },
}

/// Ordered, immutable list of steps making up one workflow.
///
/// Constructed once at startup and shared read-only afterwards; all runtime
/// state lives in [`super::instance::WorkflowInstance`]. Insertion order is
/// the traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    name: String,
    steps: Vec<StepId>,
}

impl WorkflowDefinition {
    /// Validate and build a definition. The step list must be non-empty and
    /// free of duplicates.
    pub fn new(
        name: impl Into<String>,
        steps: Vec<StepId>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();

        if steps.is_empty() {
            return Err(DefinitionError::EmptyDefinition { workflow: name });
        }

        for (idx, step) in steps.iter().enumerate() {
            if steps[..idx].contains(step) {
                return Err(DefinitionError::DuplicateStep {
                    workflow: name,
                    step: step.clone(),
                });
            }
        }

        Ok(Self { name, steps })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepId] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        // Construction rejects empty step lists.
        false
    }

    pub fn contains(&self, step: &StepId) -> bool {
        self.steps.contains(step)
    }

    pub fn index_of(&self, step: &StepId) -> Option<usize> {
        self.steps.iter().position(|s| s == step)
    }

    pub fn first_step(&self) -> &StepId {
        &self.steps[0]
    }

    pub fn last_step(&self) -> &StepId {
        &self.steps[self.steps.len() - 1]
    }

    /// The step following `step` in definition order, if any.
    pub fn next_after(&self, step: &StepId) -> Option<&StepId> {
        let idx = self.index_of(step)?;
        self.steps.get(idx + 1)
    }

    /// The step preceding `step` in definition order, if any.
    pub fn prev_before(&self, step: &StepId) -> Option<&StepId> {
        let idx = self.index_of(step)?;
        idx.checked_sub(1).map(|prev| &self.steps[prev])
    }
}
