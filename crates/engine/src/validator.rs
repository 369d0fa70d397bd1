//! Static, pre-execution check of a workflow step list.
//!
//! Run this before saving a workflow or test-running it.  Nothing here touches
//! the network or a submission; errors accumulate and each is tagged with the
//! step's 1-based position.

use serde_json::Value;
use steps::condition::ConditionOperator;
use steps::models::{ActionKind, SpecMismatch, StepSpec, WorkflowStep};

use crate::models::ValidationReport;
use crate::EngineError;

/// Validate an already-parsed step list.
pub fn validate_workflow(steps: &[WorkflowStep]) -> ValidationReport {
    let errors = steps
        .iter()
        .enumerate()
        .flat_map(|(index, step)| step_errors(step, index + 1))
        .collect();
    ValidationReport::from_errors(errors)
}

fn step_errors(step: &WorkflowStep, position: usize) -> Vec<String> {
    let mut errors = Vec::new();
    let mut push = |message: &str| errors.push(format!("Step {position}: {message}"));

    if step.title.trim().is_empty() {
        push("Title is required");
    }

    match step.spec() {
        Ok(StepSpec::Condition(condition)) => {
            if condition.field.trim().is_empty() {
                push("Condition field is required");
            }
            if condition.operator.trim().is_empty() {
                push("Condition operator is required");
            } else if condition.operator.parse::<ConditionOperator>().is_err() {
                push(&format!("Unsupported condition operator: {}", condition.operator));
            }
        }
        Ok(StepSpec::Notification(notification)) => {
            if notification.recipients.iter().all(|r| r.trim().is_empty()) {
                push("Notification recipients are required");
            }
            if notification.subject.as_deref().map_or(true, |s| s.trim().is_empty()) {
                push("Notification subject is required");
            }
        }
        Ok(StepSpec::Action(action)) => {
            let endpoint_missing = action.endpoint.as_deref().map_or(true, |e| e.trim().is_empty());
            if action.kind == ActionKind::Webhook && endpoint_missing {
                push("Webhook endpoint is required");
            }
        }
        Ok(StepSpec::Integration(integration)) => {
            if integration.endpoint.trim().is_empty() {
                push("Integration endpoint is required");
            }
        }
        Err(SpecMismatch::UnknownType) => push("Unknown step type"),
        Err(mismatch) => push(&mismatch.to_string()),
    }

    errors
}

/// Validate raw JSON as submitted by an editor.
///
/// Steps that do not even parse are reported by position alongside the
/// structural errors of the ones that do.
pub fn validate_json(workflow: &Value) -> ValidationReport {
    let Some(items) = workflow.as_array() else {
        return ValidationReport::from_errors(vec!["Workflow must be a list of steps".into()]);
    };

    let mut errors = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match serde_json::from_value::<WorkflowStep>(item.clone()) {
            Ok(step) => errors.extend(step_errors(&step, index + 1)),
            Err(e) => errors.push(format!("Step {}: Invalid step definition: {e}", index + 1)),
        }
    }
    ValidationReport::from_errors(errors)
}

/// Parse a workflow and reject it unless it validates cleanly.
pub fn parse_workflow(workflow: &Value) -> Result<Vec<WorkflowStep>, EngineError> {
    let report = validate_json(workflow);
    if !report.valid {
        return Err(EngineError::Rejected(report.errors));
    }
    Ok(serde_json::from_value(workflow.clone())?)
}
