//! Workflow execution engine.
//!
//! `WorkflowEngine` runs one form submission through its step list:
//! 1. Stable-sorts the steps by `order`.
//! 2. Skips disabled steps, logging each skip.
//! 3. Dispatches every enabled step, one at a time, to the executor
//!    registered for its type.
//! 4. Records each failure or panic against the step and moves on.
//! 5. Keeps the last redirect any step asked for.
//!
//! The engine never returns an error; the `WorkflowResult` carries
//! everything the caller needs.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info, instrument, warn};

use steps::builtin::{ActionStep, ConditionStep, IntegrationStep, NotificationStep};
use steps::{
    Environment, FormDefinition, StepError, StepExecutor, StepKind, StepOutcome, Submission,
    Transports, WorkflowContext, WorkflowStep,
};

use crate::models::WorkflowResult;

// ---------------------------------------------------------------------------
// Step registry
// ---------------------------------------------------------------------------

/// Maps step types to their executors.
pub type StepRegistry = HashMap<StepKind, Arc<dyn StepExecutor>>;

/// Registry holding the four built-in executors wired to `transports`.
pub fn builtin_registry(transports: Transports) -> StepRegistry {
    let mut registry: StepRegistry = HashMap::new();
    registry.insert(StepKind::Condition, Arc::new(ConditionStep));
    registry.insert(
        StepKind::Notification,
        Arc::new(NotificationStep::new(transports.clone())),
    );
    registry.insert(StepKind::Action, Arc::new(ActionStep::new(transports.clone())));
    registry.insert(StepKind::Integration, Arc::new(IntegrationStep::new(transports)));
    registry
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Runs workflows against submissions.
///
/// Holds no per-run state, so one engine can serve any number of concurrent
/// submissions.
#[derive(Clone)]
pub struct WorkflowEngine {
    registry: StepRegistry,
    environment: Arc<Environment>,
}

impl WorkflowEngine {
    pub fn new(registry: StepRegistry, environment: Arc<Environment>) -> Self {
        Self { registry, environment }
    }

    /// Engine with the built-in executors.
    pub fn with_transports(transports: Transports, environment: Arc<Environment>) -> Self {
        Self::new(builtin_registry(transports), environment)
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Execute `steps` for one submission.
    #[instrument(
        skip_all,
        fields(form_id = %form.id, submission_id = %submission.id, steps = steps.len())
    )]
    pub async fn execute_workflow(
        &self,
        steps: &[WorkflowStep],
        submission: &Submission,
        form: &FormDefinition,
    ) -> WorkflowResult {
        let ctx = WorkflowContext::new(submission, form, &self.environment);

        let mut ordered: Vec<&WorkflowStep> = steps.iter().collect();
        ordered.sort_by_key(|step| step.order);

        let mut errors = Vec::new();
        let mut logs = Vec::new();
        let mut redirect_url = None;

        for step in ordered {
            if !step.enabled {
                logs.push(format!("Skipping disabled step: {}", step.title));
                continue;
            }

            logs.push(format!("Executing step: {}", step.title));

            match self.run_step(step, &ctx).await {
                Ok(Ok(outcome)) => {
                    logs.extend(outcome.notes);
                    if let Some(url) = outcome.redirect_url {
                        redirect_url = Some(url);
                    }
                    info!(step = %step.title, kind = %step.kind, "step succeeded");
                    logs.push(format!("Step \"{}\" completed: true", step.title));
                }
                Ok(Err(step_err)) => {
                    warn!(step = %step.title, kind = %step.kind, error = %step_err, "step failed");
                    errors.push(format!("Step \"{}\" failed: {}", step.title, step_err));
                    logs.push(format!("Step \"{}\" completed: false", step.title));
                }
                Err(panic_msg) => {
                    error!(step = %step.title, kind = %step.kind, error = %panic_msg, "step panicked");
                    errors.push(format!("Step \"{}\" threw error: {}", step.title, panic_msg));
                    logs.push(format!("Step \"{}\" error: {}", step.title, panic_msg));
                }
            }
        }

        let result = WorkflowResult {
            success: errors.is_empty(),
            errors,
            logs,
            redirect_url,
        };
        info!(success = result.success, failed = result.errors.len(), "workflow finished");
        result
    }

    /// Dispatch one step.  The outer `Err` carries a panic message.
    async fn run_step(
        &self,
        step: &WorkflowStep,
        ctx: &WorkflowContext<'_>,
    ) -> Result<Result<StepOutcome, StepError>, String> {
        let Some(executor) = self.registry.get(&step.kind) else {
            return Ok(Err(StepError::config(format!("Unknown step type: {}", step.kind))));
        };

        AssertUnwindSafe(executor.execute(step, ctx))
            .catch_unwind()
            .await
            .map_err(panic_message)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown error".to_owned()
    }
}
