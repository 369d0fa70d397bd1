//! Typed client for the HTTP API, used by `form-flow submit`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use engine::{ValidationReport, WorkflowResult};
use steps::models::{FormData, FormDefinition, Submission};

use crate::orchestrator::SubmitResponse;
use crate::store::WorkflowRun;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response; `body` is the raw JSON error payload.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: Value },
}

#[derive(Debug, Clone)]
pub struct WorkflowClient {
    base_url: String,
    http: reqwest::Client,
}

impl WorkflowClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_owned(), http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(ClientError::Status { status: status.as_u16(), body });
        }
        Ok(response.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        Self::read(self.http.get(self.url(path)).send().await?).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        Self::read(self.http.post(self.url(path)).json(body).send().await?).await
    }

    pub async fn create_form(&self, form: &FormDefinition) -> Result<FormDefinition, ClientError> {
        self.post("/api/forms", form).await
    }

    pub async fn list_forms(&self) -> Result<Vec<FormDefinition>, ClientError> {
        self.get("/api/forms").await
    }

    pub async fn get_form(&self, id: &str) -> Result<FormDefinition, ClientError> {
        self.get(&format!("/api/forms/{id}")).await
    }

    pub async fn submit(&self, form_id: &str, data: &FormData) -> Result<SubmitResponse, ClientError> {
        self.post(&format!("/api/forms/{form_id}/submit"), data).await
    }

    pub async fn list_submissions(&self, form_id: &str) -> Result<Vec<Submission>, ClientError> {
        self.get(&format!("/api/forms/{form_id}/submissions")).await
    }

    pub async fn test_workflow(
        &self,
        workflow: &Value,
        form_data: &FormData,
        form: &FormDefinition,
    ) -> Result<WorkflowResult, ClientError> {
        let body = json!({ "workflow": workflow, "formData": form_data, "form": form });
        self.post("/api/workflow/test", &body).await
    }

    pub async fn validate(&self, workflow: &Value) -> Result<ValidationReport, ClientError> {
        self.post("/api/workflow/validate", workflow).await
    }

    pub async fn status(&self, submission_id: &str) -> Result<WorkflowRun, ClientError> {
        self.get(&format!("/api/workflow/status/{submission_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn submit_posts_raw_form_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/forms/contact/submit"))
            .and(body_json(json!({ "email": "ada@example.com" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "submissionId": "sub_1", "message": "Form submitted successfully",
                "errors": [], "statusUrl": "http://x/api/workflow/status/sub_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = WorkflowClient::new(format!("{}/", server.uri()));
        let data = json!({ "email": "ada@example.com" }).as_object().cloned().unwrap();
        let response = client.submit("contact", &data).await.unwrap();
        assert!(response.success);
        assert_eq!(response.submission_id, "sub_1");
        assert_eq!(response.redirect_url, None);
    }

    #[tokio::test]
    async fn error_bodies_are_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Form not found" })))
            .mount(&server)
            .await;

        let client = WorkflowClient::new(server.uri());
        match client.get_form("ghost").await {
            Err(ClientError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body["error"], "Form not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
