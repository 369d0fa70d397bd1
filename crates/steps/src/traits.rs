//! The `StepExecutor` trait: the contract every step handler must fulfil.

use async_trait::async_trait;
use serde_json::Value;

use crate::environment::Environment;
use crate::models::{FormData, FormDefinition, Submission, WorkflowStep};
use crate::template::{self, TemplateVars};
use crate::StepError;

/// Read-only bundle visible to every step of one workflow run.
///
/// Built fresh for each run and never shared between submissions.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowContext<'a> {
    /// Alias of `submission.data`.
    pub form_data: &'a FormData,
    pub form: &'a FormDefinition,
    pub submission: &'a Submission,
    pub environment: &'a Environment,
}

impl<'a> WorkflowContext<'a> {
    pub fn new(
        submission: &'a Submission,
        form: &'a FormDefinition,
        environment: &'a Environment,
    ) -> Self {
        Self {
            form_data: &submission.data,
            form,
            submission,
            environment,
        }
    }

    pub fn template_vars(&self) -> TemplateVars<'a> {
        TemplateVars {
            fields: self.form_data,
            form_title: &self.form.title,
            submission_id: &self.submission.id,
        }
    }

    /// Resolve `{{...}}` placeholders against this run.
    pub fn render(&self, template: &str) -> String {
        template::resolve(template, &self.template_vars())
    }

    /// Resolve every string leaf of a JSON value against this run.
    pub fn render_value(&self, value: &Value) -> Value {
        template::resolve_value(value, &self.template_vars())
    }
}

/// What a successful step hands back to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Post-submission navigation target; the last one set in a run wins.
    pub redirect_url: Option<String>,
    /// Extra audit lines appended to the run's logs.
    pub notes: Vec<String>,
}

impl StepOutcome {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn redirect(url: impl Into<String>) -> Self {
        Self {
            redirect_url: Some(url.into()),
            notes: Vec::new(),
        }
    }

    pub fn note(mut self, line: impl Into<String>) -> Self {
        self.notes.push(line.into());
        self
    }
}

/// The core step trait.
///
/// The engine dispatches each enabled step to the executor registered for
/// its type.  Failures are returned, not thrown; the engine records them and
/// moves on to the next step.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError>;
}
