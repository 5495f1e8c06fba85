use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use super::definition::{StepId, WorkflowDefinition};

/// A single validation failure, addressed to one input field so the UI can
/// attach the message to the right control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// One screen of a workflow.
///
/// A renderer declares which step it handles and how that step's raw input
/// is validated into the data stored in the instance payload. The machine
/// never calls `validate`; the session does, before advancing. When
/// resuming, a renderer pre-fills from
/// [`super::instance::WorkflowInstance::step_payload`].
#[async_trait]
pub trait StepRenderer: Send + Sync {
    fn step_id(&self) -> StepId;

    /// Validate raw input for this step. `Ok` carries the cleaned data to
    /// merge into the payload; `Err` carries per-field messages and leaves
    /// the instance untouched.
    async fn validate(&self, input: &Value) -> Result<Value, Vec<FieldError>>;
}

/// Lookup table from step id to its renderer.
#[derive(Default)]
pub struct StepRegistry {
    renderers: HashMap<StepId, Box<dyn StepRenderer>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a renderer under the step id it declares. A later
    /// registration for the same step replaces the earlier one.
    pub fn register(&mut self, renderer: Box<dyn StepRenderer>) {
        self.renderers.insert(renderer.step_id(), renderer);
    }

    pub fn renderer_for(&self, step: &StepId) -> Option<&dyn StepRenderer> {
        self.renderers.get(step).map(|renderer| renderer.as_ref())
    }

    /// Definition steps with no registered renderer, in definition order.
    pub fn missing_renderers(&self, definition: &WorkflowDefinition) -> Vec<StepId> {
        definition
            .steps()
            .iter()
            .filter(|step| !self.renderers.contains_key(step))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.renderers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PassThrough(StepId);

    #[async_trait]
    impl StepRenderer for PassThrough {
        fn step_id(&self) -> StepId {
            self.0.clone()
        }

        async fn validate(&self, input: &Value) -> Result<Value, Vec<FieldError>> {
            Ok(input.clone())
        }
    }

    #[test]
    fn missing_renderers_reported_in_definition_order() {
        let definition = WorkflowDefinition::new(
            "application",
            vec!["a".into(), "b".into(), "c".into()],
        )
        .unwrap();

        let mut registry = StepRegistry::new();
        registry.register(Box::new(PassThrough("b".into())));

        assert_eq!(
            registry.missing_renderers(&definition),
            vec![StepId::from("a"), StepId::from("c")]
        );

        registry.register(Box::new(PassThrough("a".into())));
        registry.register(Box::new(PassThrough("c".into())));
        assert!(registry.missing_renderers(&definition).is_empty());
    }
}
