use async_trait::async_trait;
use tracing::debug;

use crate::condition::{evaluate, ConditionOperator};
use crate::models::{StepSpec, WorkflowStep};
use crate::traits::{StepExecutor, StepOutcome, WorkflowContext};
use crate::value::to_text;
use crate::StepError;

/// Evaluates one comparison against a submitted field.
///
/// Matching actions are recorded in the run's logs only; applying them to
/// a live form is the renderer's job.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionStep;

#[async_trait]
impl StepExecutor for ConditionStep {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let config = match step.spec() {
            Ok(StepSpec::Condition(config)) => config,
            Ok(_) => return Err(StepError::config("No condition configuration found")),
            Err(mismatch) => return Err(StepError::config(mismatch.to_string())),
        };

        if config.field.trim().is_empty() {
            return Err(StepError::config("Condition field is required"));
        }
        if config.operator.parse::<ConditionOperator>().is_err() {
            return Err(StepError::config(format!(
                "Unsupported condition operator: {}",
                config.operator
            )));
        }

        let known_field =
            ctx.form_data.contains_key(&config.field) || ctx.form.element(&config.field).is_some();
        if !known_field {
            return Err(StepError::config(format!(
                "Unknown field reference: {}",
                config.field
            )));
        }

        let value = ctx.form_data.get(&config.field);
        let matched = evaluate(value, &config.operator, &config.value);
        debug!(field = %config.field, operator = %config.operator, matched, "condition evaluated");

        let mut outcome = StepOutcome::done().note(format!(
            "Condition {} {} {} evaluated to {}",
            config.field,
            config.operator,
            to_text(Some(&config.value)),
            matched
        ));

        if matched {
            for action in &config.actions {
                let line = match (&action.target_id, &action.value) {
                    (Some(target), Some(value)) => {
                        format!("Condition met, recorded action: {} {} = {}", action.kind, target, value)
                    }
                    (Some(target), None) => {
                        format!("Condition met, recorded action: {} {}", action.kind, target)
                    }
                    (None, Some(value)) => {
                        format!("Condition met, recorded action: {} {}", action.kind, value)
                    }
                    (None, None) => format!("Condition met, recorded action: {}", action.kind),
                };
                outcome = outcome.note(line);
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::models::{FormDefinition, Submission};
    use serde_json::json;

    fn step(config: serde_json::Value) -> WorkflowStep {
        serde_json::from_value(json!({
            "id": "c1", "type": "condition", "title": "Check", "order": 0,
            "enabled": true, "config": { "condition": config }
        }))
        .unwrap()
    }

    async fn run(step: &WorkflowStep) -> Result<StepOutcome, StepError> {
        let submission = Submission::pending(
            "sub_1",
            "form_1",
            json!({ "age": "25", "interest": "Sales" }).as_object().cloned().unwrap(),
        );
        let form = FormDefinition { id: "form_1".into(), title: "T".into(), ..Default::default() };
        let env = Environment::default();
        let ctx = WorkflowContext::new(&submission, &form, &env);
        ConditionStep.execute(step, &ctx).await
    }

    #[tokio::test]
    async fn matching_condition_records_actions() {
        let outcome = run(&step(json!({
            "field": "age", "operator": "greaterThan", "value": "18",
            "actions": [{ "type": "show", "targetId": "adult_content" }]
        })))
        .await
        .unwrap();

        assert_eq!(outcome.redirect_url, None);
        assert_eq!(outcome.notes.len(), 2);
        assert!(outcome.notes[0].ends_with("evaluated to true"));
        assert_eq!(outcome.notes[1], "Condition met, recorded action: show adult_content");
    }

    #[tokio::test]
    async fn non_matching_condition_still_succeeds() {
        let outcome = run(&step(json!({
            "field": "interest", "operator": "equals", "value": "Support", "actions": [
                { "type": "redirect", "value": "https://example.com" }
            ]
        })))
        .await
        .unwrap();
        assert_eq!(outcome.notes.len(), 1);
        assert!(outcome.notes[0].ends_with("evaluated to false"));
    }

    #[tokio::test]
    async fn unknown_operator_fails_the_step() {
        let err = run(&step(json!({ "field": "age", "operator": "foo", "value": "1" }))).await.unwrap_err();
        assert_eq!(err.to_string(), "Unsupported condition operator: foo");
    }

    #[tokio::test]
    async fn unknown_field_fails_the_step() {
        let err = run(&step(json!({ "field": "ghost", "operator": "equals", "value": "1" }))).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown field reference: ghost");
    }
}
