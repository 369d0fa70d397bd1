//! Submission intake: check, persist, run the form's workflow, record the run.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use engine::{check_submission, validate_workflow, EngineError, FieldErrors, WorkflowEngine};
use steps::models::{FormData, FormDefinition, Submission, SubmissionStatus};

use crate::store::{StoreError, SubmissionStore, WorkflowRun};

/// Explicit service settings handed to the orchestrator at construction.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Public base URL of this service, without a trailing slash.
    pub base_url: String,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_owned() }
    }

    pub fn status_url(&self, submission_id: &str) -> String {
        format!("{}/api/workflow/status/{submission_id}", self.base_url)
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("form not found: {0}")]
    FormNotFound(String),

    #[error("submission failed field validation")]
    Invalid(FieldErrors),

    #[error(transparent)]
    Workflow(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Submitted values plus request metadata.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub data: FormData,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub submission_id: String,
    pub message: String,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub status_url: String,
}

#[derive(Clone)]
pub struct SubmissionOrchestrator {
    store: Arc<dyn SubmissionStore>,
    engine: WorkflowEngine,
    config: ServiceConfig,
}

impl SubmissionOrchestrator {
    pub fn new(store: Arc<dyn SubmissionStore>, engine: WorkflowEngine, config: ServiceConfig) -> Self {
        Self { store, engine, config }
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Store a form after its workflow passes validation.
    #[instrument(skip_all, fields(form_id = %form.id, steps = form.workflow.len()))]
    pub async fn save_form(&self, form: &FormDefinition) -> Result<(), OrchestratorError> {
        let report = validate_workflow(&form.workflow);
        if !report.valid {
            warn!(errors = ?report.errors, "rejecting form with an invalid workflow");
            return Err(EngineError::Rejected(report.errors).into());
        }
        self.store.save_form(form).await?;
        info!("form saved");
        Ok(())
    }

    /// Accept a submission for `form_id` and run its workflow.
    ///
    /// Field-rule violations reject the submission before anything is
    /// stored.  Workflow step failures do not: the submission is stored,
    /// marked `failed`, and the errors are returned in the response.  A
    /// store failure after the run is appended to those errors.
    #[instrument(skip_all, fields(form_id = %form_id))]
    pub async fn submit(&self, form_id: &str, request: SubmitRequest) -> Result<SubmitResponse, OrchestratorError> {
        let form = match self.store.get_form(form_id).await {
            Ok(form) => form,
            Err(StoreError::NotFound) => return Err(OrchestratorError::FormNotFound(form_id.to_owned())),
            Err(e) => return Err(e.into()),
        };

        let field_errors = check_submission(&form, &request.data);
        if !field_errors.is_empty() {
            info!(fields = field_errors.len(), "submission rejected by field rules");
            return Err(OrchestratorError::Invalid(field_errors));
        }

        let mut submission = Submission::pending(
            format!("sub_{}", Uuid::new_v4().simple()),
            form.id.clone(),
            request.data,
        );
        submission.ip_address = request.ip_address;
        submission.user_agent = request.user_agent;
        self.store.insert_submission(&submission).await?;
        info!(submission_id = %submission.id, "submission stored");

        let started_at = Utc::now();
        let result = self
            .engine
            .execute_workflow(&form.workflow, &submission, &form)
            .await;
        let finished_at = Utc::now();

        let status = if result.success { SubmissionStatus::Completed } else { SubmissionStatus::Failed };
        let mut bookkeeping = Vec::new();
        if let Err(e) = self.store.update_status(&submission.id, status).await {
            error!(submission_id = %submission.id, error = %e, "failed to update submission status");
            bookkeeping.push(format!("Failed to update submission status: {e}"));
        }

        let run = WorkflowRun {
            submission_id: submission.id.clone(),
            result,
            started_at,
            finished_at,
        };
        if let Err(e) = self.store.save_run(&run).await {
            error!(submission_id = %submission.id, error = %e, "failed to record workflow run");
            bookkeeping.push(format!("Failed to record workflow run: {e}"));
        }

        let result = run.result;
        let success = result.success && bookkeeping.is_empty();
        let mut errors = result.errors;
        errors.extend(bookkeeping);
        Ok(SubmitResponse {
            success,
            message: if success {
                "Form submitted successfully".to_owned()
            } else if result.success {
                "Form submitted but its status could not be recorded".to_owned()
            } else {
                "Form submitted but workflow failed".to_owned()
            },
            errors,
            redirect_url: result.redirect_url,
            status_url: self.config.status_url(&submission.id),
            submission_id: submission.id,
        })
    }

    pub async fn status(&self, submission_id: &str) -> Result<WorkflowRun, OrchestratorError> {
        Ok(self.store.get_run(submission_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use steps::mock::MockHttp;
    use steps::{Environment, Transports};

    use crate::store::MemoryStore;

    fn orchestrator(http: Arc<MockHttp>) -> SubmissionOrchestrator {
        orchestrator_over(http, Arc::new(MemoryStore::new()))
    }

    fn orchestrator_over(http: Arc<MockHttp>, store: Arc<dyn SubmissionStore>) -> SubmissionOrchestrator {
        let engine = WorkflowEngine::with_transports(
            Transports::default().with_http(http),
            Arc::new(Environment::default()),
        );
        SubmissionOrchestrator::new(store, engine, ServiceConfig::new("https://forms.example.com/"))
    }

    /// Memory store whose status updates always fail.
    #[derive(Default)]
    struct StatusWritesFail {
        inner: MemoryStore,
    }

    #[async_trait]
    impl SubmissionStore for StatusWritesFail {
        async fn save_form(&self, form: &FormDefinition) -> Result<(), StoreError> {
            self.inner.save_form(form).await
        }
        async fn get_form(&self, id: &str) -> Result<FormDefinition, StoreError> {
            self.inner.get_form(id).await
        }
        async fn list_forms(&self) -> Result<Vec<FormDefinition>, StoreError> {
            self.inner.list_forms().await
        }
        async fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError> {
            self.inner.insert_submission(submission).await
        }
        async fn update_status(&self, _id: &str, _status: SubmissionStatus) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection closed".into()))
        }
        async fn list_submissions(&self, form_id: &str) -> Result<Vec<Submission>, StoreError> {
            self.inner.list_submissions(form_id).await
        }
        async fn save_run(&self, run: &WorkflowRun) -> Result<(), StoreError> {
            self.inner.save_run(run).await
        }
        async fn get_run(&self, submission_id: &str) -> Result<WorkflowRun, StoreError> {
            self.inner.get_run(submission_id).await
        }
    }

    fn contact_form() -> FormDefinition {
        serde_json::from_value(json!({
            "id": "contact", "title": "Contact us",
            "pages": [{ "id": "p1", "elements": [
                { "id": "email", "type": "email", "label": "Email", "required": true }
            ] }],
            "workflow": [
                { "id": "s1", "type": "action", "title": "Notify CRM", "order": 1,
                  "config": { "action": { "type": "webhook", "endpoint": "https://crm.example.com/in" } } },
                { "id": "s2", "type": "action", "title": "Thanks", "order": 2,
                  "config": { "action": { "type": "redirect", "endpoint": "/thanks" } } }
            ]
        }))
        .unwrap()
    }

    fn data(value: serde_json::Value) -> FormData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn status_urls_drop_trailing_slashes() {
        let config = ServiceConfig::new("http://localhost:8080/");
        assert_eq!(config.status_url("sub_1"), "http://localhost:8080/api/workflow/status/sub_1");
    }

    #[tokio::test]
    async fn successful_submission_is_completed_and_recorded() {
        let http = Arc::new(MockHttp::responding(200));
        let orchestrator = orchestrator(http.clone());
        orchestrator.save_form(&contact_form()).await.unwrap();

        let response = orchestrator
            .submit(
                "contact",
                SubmitRequest { data: data(json!({ "email": "ada@example.com" })), ..Default::default() },
            )
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.message, "Form submitted successfully");
        assert_eq!(response.redirect_url.as_deref(), Some("/thanks"));
        assert!(response.submission_id.starts_with("sub_"));
        assert_eq!(
            response.status_url,
            format!("https://forms.example.com/api/workflow/status/{}", response.submission_id)
        );
        assert_eq!(http.requests().len(), 1);

        let stored = orchestrator.store().list_submissions("contact").await.unwrap();
        assert_eq!(stored[0].status, SubmissionStatus::Completed);
        let run = orchestrator.status(&response.submission_id).await.unwrap();
        assert!(run.result.success);
        assert!(run.finished_at >= run.started_at);
    }

    #[tokio::test]
    async fn failing_workflow_still_stores_the_submission() {
        let orchestrator = orchestrator(Arc::new(MockHttp::responding(500)));
        orchestrator.save_form(&contact_form()).await.unwrap();

        let response = orchestrator
            .submit(
                "contact",
                SubmitRequest { data: data(json!({ "email": "ada@example.com" })), ..Default::default() },
            )
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(response.message, "Form submitted but workflow failed");
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].starts_with("Step \"Notify CRM\" failed:"));
        assert_eq!(response.redirect_url.as_deref(), Some("/thanks"));

        let stored = orchestrator.store().list_submissions("contact").await.unwrap();
        assert_eq!(stored[0].status, SubmissionStatus::Failed);
    }

    #[tokio::test]
    async fn field_errors_reject_before_storing() {
        let orchestrator = orchestrator(Arc::new(MockHttp::responding(200)));
        orchestrator.save_form(&contact_form()).await.unwrap();

        let err = orchestrator
            .submit("contact", SubmitRequest { data: data(json!({ "email": "nope" })), ..Default::default() })
            .await
            .unwrap_err();

        match err {
            OrchestratorError::Invalid(fields) => {
                assert_eq!(fields["email"], vec!["Email must be a valid email address"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(orchestrator.store().list_submissions("contact").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_forms_and_invalid_workflows_are_rejected() {
        let orchestrator = orchestrator(Arc::new(MockHttp::responding(200)));
        assert!(matches!(
            orchestrator.submit("ghost", SubmitRequest::default()).await,
            Err(OrchestratorError::FormNotFound(id)) if id == "ghost"
        ));

        let mut form = contact_form();
        form.workflow[0].title.clear();
        assert!(matches!(
            orchestrator.save_form(&form).await,
            Err(OrchestratorError::Workflow(EngineError::Rejected(_)))
        ));
    }

    #[tokio::test]
    async fn status_write_failures_show_up_in_the_response() {
        let store = Arc::new(StatusWritesFail::default());
        let orchestrator = orchestrator_over(Arc::new(MockHttp::responding(200)), store.clone());
        orchestrator.save_form(&contact_form()).await.unwrap();

        let response = orchestrator
            .submit(
                "contact",
                SubmitRequest { data: data(json!({ "email": "ada@example.com" })), ..Default::default() },
            )
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(response.message, "Form submitted but its status could not be recorded");
        assert_eq!(
            response.errors,
            vec!["Failed to update submission status: storage backend error: connection closed"]
        );
        assert_eq!(response.redirect_url.as_deref(), Some("/thanks"));

        let run = orchestrator.status(&response.submission_id).await.unwrap();
        assert!(run.result.success);
        let stored = store.list_submissions("contact").await.unwrap();
        assert_eq!(stored[0].status, SubmissionStatus::Pending);
    }
}
