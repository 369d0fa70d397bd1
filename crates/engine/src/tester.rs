//! Dry runs of a form's workflow against sample data.
//!
//! `WorkflowTester` validates the step list, statically checks every step,
//! then executes the whole workflow through the engine under a `test_`
//! submission id.  Nothing is persisted.

use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use steps::builtin::absolute_url;
use steps::condition::{evaluate, ConditionOperator};
use steps::models::{
    ActionKind, ElementKind, FormData, FormDefinition, IntegrationService, NotificationChannel,
    StepKind, StepSpec, Submission, WorkflowStep,
};
use steps::Environment;

use crate::executor::WorkflowEngine;
use crate::models::WorkflowResult;
use crate::validator::validate_workflow;

/// Static check of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCheck {
    pub step_id: String,
    pub step_type: StepKind,
    pub step_title: String,
    pub success: bool,
    pub message: String,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub success: bool,
    pub message: String,
    pub errors: Vec<String>,
    pub logs: Vec<String>,
    pub execution_time_ms: u64,
    pub step_results: Vec<StepCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub average_time_ms: f64,
    pub min_time_ms: u64,
    pub max_time_ms: u64,
    /// Percentage of passing runs, 0 to 100.
    pub success_rate: f64,
    pub results: Vec<TestReport>,
}

/// A fresh id for a submission that is never stored.
pub fn test_submission_id() -> String {
    format!("test_{}", Uuid::new_v4().simple())
}

/// Run `steps` against `data` as an unsaved test submission.
pub async fn run_with_data(
    engine: &WorkflowEngine,
    steps: &[WorkflowStep],
    data: FormData,
    form: &FormDefinition,
) -> WorkflowResult {
    let submission = Submission::pending(test_submission_id(), form.id.clone(), data);
    engine.execute_workflow(steps, &submission, form).await
}

/// Deterministic sample values for every input element of `form`.
pub fn sample_data(form: &FormDefinition, today: NaiveDate) -> FormData {
    let mut data = FormData::new();
    for element in form.elements().filter(|e| !e.kind.is_decorative()) {
        let first_option = element.options.first().cloned();
        let value = match element.kind {
            ElementKind::Text => json!("Sample text input"),
            ElementKind::Email => json!("test@example.com"),
            ElementKind::Textarea => json!("Sample textarea content with multiple lines\nLine 2\nLine 3"),
            ElementKind::Url => json!("https://example.com"),
            ElementKind::Tel => json!("+1234567890"),
            ElementKind::Number => json!(42),
            ElementKind::Date => json!(today.format("%Y-%m-%d").to_string()),
            ElementKind::Select | ElementKind::Radio => match first_option {
                Some(option) => json!(option),
                None => continue,
            },
            ElementKind::Checkbox => match first_option {
                Some(option) => json!([option]),
                None => continue,
            },
            ElementKind::Rating => json!(3),
            ElementKind::Range => {
                let bound = |key: &str, default: i64| {
                    element.properties.get(key).and_then(Value::as_i64).unwrap_or(default)
                };
                json!((bound("min", 0) + bound("max", 100)) / 2)
            }
            other => json!(format!("Sample {} value", other.as_str())),
        };
        data.insert(element.id.clone(), value);
    }
    data
}

pub struct WorkflowTester {
    engine: WorkflowEngine,
}

impl WorkflowTester {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self { engine }
    }

    /// Validate, statically check and execute `form.workflow`.
    ///
    /// Sample data is generated from the form when `test_data` is `None`.
    #[instrument(skip_all, fields(form_id = %form.id, steps = form.workflow.len()))]
    pub async fn test_workflow(&self, form: &FormDefinition, test_data: Option<FormData>) -> TestReport {
        let started = Instant::now();
        let mut logs = Vec::new();
        let mut errors = Vec::new();

        let data = test_data.unwrap_or_else(|| sample_data(form, Utc::now().date_naive()));
        logs.push(format!("Generated test data: {}", Value::Object(data.clone())));

        let validation = validate_workflow(&form.workflow);
        if !validation.valid {
            return TestReport {
                success: false,
                message: "Workflow validation failed".to_owned(),
                errors: validation.errors,
                logs,
                execution_time_ms: elapsed_ms(started),
                step_results: Vec::new(),
            };
        }
        logs.push("Workflow validation passed".to_owned());

        let mut step_results = Vec::with_capacity(form.workflow.len());
        for step in &form.workflow {
            let check = check_step(step, &data, self.engine.environment());
            logs.push(format!(
                "Step {}: {}",
                step.title,
                if check.success { "PASSED" } else { "FAILED" }
            ));
            if let Some(error) = &check.error {
                errors.push(format!("Step \"{}\" failed: {}", step.title, error));
            }
            step_results.push(check);
        }

        let run = run_with_data(&self.engine, &form.workflow, data, form).await;
        let success = step_results.iter().all(|c| c.success) && run.success;
        errors.extend(run.errors);
        logs.extend(run.logs);

        info!(success, "workflow test finished");
        TestReport {
            success,
            message: if success {
                "All tests passed successfully".to_owned()
            } else {
                "Some tests failed".to_owned()
            },
            errors,
            logs,
            execution_time_ms: elapsed_ms(started),
            step_results,
        }
    }

    /// Run the full test `iterations` times with generated data.
    pub async fn run_repeated(&self, form: &FormDefinition, iterations: usize) -> PerformanceReport {
        let mut results = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            results.push(self.test_workflow(form, None).await);
        }

        let times: Vec<u64> = results.iter().map(|r| r.execution_time_ms).collect();
        let passed = results.iter().filter(|r| r.success).count();
        let runs = results.len().max(1) as f64;

        PerformanceReport {
            average_time_ms: times.iter().sum::<u64>() as f64 / runs,
            min_time_ms: times.iter().copied().min().unwrap_or_default(),
            max_time_ms: times.iter().copied().max().unwrap_or_default(),
            success_rate: passed as f64 / runs * 100.0,
            results,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Check one step's configuration without any network traffic.
pub fn check_step(step: &WorkflowStep, data: &FormData, environment: &Environment) -> StepCheck {
    let started = Instant::now();
    let outcome = match step.spec() {
        Ok(spec) => check_spec(spec, data, environment),
        Err(mismatch) => Err(mismatch.to_string()),
    };

    let (success, message, error) = match outcome {
        Ok(message) => (true, message, None),
        Err(error) => (false, format!("{} test failed", capitalised(step.kind)), Some(error)),
    };

    StepCheck {
        step_id: step.id.clone(),
        step_type: step.kind,
        step_title: step.title.clone(),
        success,
        message,
        execution_time_ms: elapsed_ms(started),
        error,
    }
}

fn capitalised(kind: StepKind) -> String {
    let name = kind.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}

fn check_spec(spec: StepSpec<'_>, data: &FormData, environment: &Environment) -> Result<String, String> {
    match spec {
        StepSpec::Condition(condition) => {
            condition
                .operator
                .parse::<ConditionOperator>()
                .map_err(|_| format!("Unsupported condition operator: {}", condition.operator))?;
            let result = evaluate(data.get(&condition.field), &condition.operator, &condition.value);
            Ok(format!("Condition evaluated to: {result}"))
        }
        StepSpec::Notification(notification) => {
            if notification.recipients.iter().all(|r| r.trim().is_empty()) {
                return Err("No recipients specified".to_owned());
            }
            if notification.message.trim().is_empty() {
                return Err("No message specified".to_owned());
            }
            let missing = match notification.channel {
                NotificationChannel::Email => environment.smtp.is_none().then_some("SMTP settings"),
                NotificationChannel::Sms => environment.twilio.is_none().then_some("Twilio credentials"),
                NotificationChannel::Slack => (notification.webhook_url.is_none()
                    && environment.slack_webhook_url.is_none())
                .then_some("Slack webhook URL"),
                NotificationChannel::Push => {
                    environment.push_gateway_url.is_none().then_some("push gateway URL")
                }
                NotificationChannel::Unsupported => {
                    return Err("Unsupported notification type".to_owned())
                }
            };
            if let Some(missing) = missing {
                return Err(format!("Missing configuration: {missing}"));
            }
            Ok(format!(
                "Notification configuration is valid ({} recipients)",
                notification.recipients.len()
            ))
        }
        StepSpec::Action(action) => {
            let endpoint = action.endpoint.as_deref().unwrap_or_default();
            match action.kind {
                ActionKind::Webhook => {
                    if endpoint.trim().is_empty() {
                        return Err("No endpoint specified".to_owned());
                    }
                    absolute_url(endpoint).map_err(|_| "Invalid endpoint URL".to_owned())?;
                    Ok(format!(
                        "Action configuration is valid ({} {endpoint})",
                        action.method.unwrap_or_default().as_str()
                    ))
                }
                ActionKind::Redirect if endpoint.trim().is_empty() => {
                    Err("No redirect URL specified".to_owned())
                }
                ActionKind::Unsupported => Err("Unsupported action type".to_owned()),
                kind => Ok(format!("Action configuration is valid ({kind})")),
            }
        }
        StepSpec::Integration(integration) => {
            if integration.service == IntegrationService::Unsupported {
                return Err("Unsupported integration service".to_owned());
            }
            if integration.endpoint.trim().is_empty() {
                return Err("No endpoint specified".to_owned());
            }
            absolute_url(&integration.endpoint).map_err(|_| "Invalid endpoint URL".to_owned())?;
            Ok(format!(
                "Integration configuration is valid ({})",
                serde_json::to_value(integration.service)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .unwrap_or_default()
            ))
        }
    }
}
