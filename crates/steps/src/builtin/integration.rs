use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::info;

use super::{absolute_url, deliver, http_client};
use crate::models::{IntegrationConfig, IntegrationService, StepSpec, WorkflowStep};
use crate::transport::{HttpRequest, Transports};
use crate::traits::{StepExecutor, StepOutcome, WorkflowContext};
use crate::StepError;

/// Pushes the submission to Zapier or a custom HTTP endpoint.
#[derive(Clone)]
pub struct IntegrationStep {
    transports: Transports,
}

impl IntegrationStep {
    pub fn new(transports: Transports) -> Self {
        Self { transports }
    }
}

fn payload(config: &IntegrationConfig, ctx: &WorkflowContext<'_>) -> Value {
    let mut body = Map::new();
    body.insert("formId".into(), json!(ctx.form.id));
    body.insert("formTitle".into(), json!(ctx.form.title));
    body.insert("submissionId".into(), json!(ctx.submission.id));
    body.insert(
        "submittedAt".into(),
        json!(ctx.submission.submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    body.insert("formData".into(), Value::Object(ctx.form_data.clone()));

    if !config.mapping.is_empty() {
        let mapped: Map<String, Value> = config
            .mapping
            .iter()
            .filter_map(|(field, external)| {
                ctx.form_data.get(field).map(|v| (external.clone(), v.clone()))
            })
            .collect();
        body.insert("mappedData".into(), Value::Object(mapped));
    }

    for (key, value) in &config.additional_data {
        body.insert(key.clone(), value.clone());
    }
    ctx.render_value(&Value::Object(body))
}

#[async_trait]
impl StepExecutor for IntegrationStep {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let config = match step.spec() {
            Ok(StepSpec::Integration(config)) => config,
            Ok(_) => return Err(StepError::config("No integration configuration found")),
            Err(mismatch) => return Err(StepError::config(mismatch.to_string())),
        };

        let label = match config.service {
            IntegrationService::Zapier => "Zapier integration",
            IntegrationService::Custom => "Custom integration",
            IntegrationService::Unsupported => {
                return Err(StepError::config("Unsupported integration service"))
            }
        };

        if config.endpoint.trim().is_empty() {
            return Err(StepError::config("Integration endpoint not configured"));
        }
        let url = absolute_url(&config.endpoint)?;
        let http = http_client(&self.transports.http)?;

        let mut request = HttpRequest::post_json(url.as_str(), &payload(config, ctx));
        request.method = config.method.unwrap_or_default();
        for (name, value) in &config.headers {
            request.set_header(name.as_str(), ctx.render(value));
        }
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            if !request.has_header("authorization") {
                request.set_header("Authorization", format!("Bearer {key}"));
            }
        }

        let response = deliver(http, request, label).await?;
        info!(service = ?config.service, status = response.status, "integration delivered");
        Ok(StepOutcome::done().note(format!("{label} delivered to {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::mock::MockHttp;
    use crate::models::{FormDefinition, Submission};
    use std::sync::Arc;

    fn step(config: Value) -> WorkflowStep {
        serde_json::from_value(json!({
            "id": "i1", "type": "integration", "title": "Sync",
            "config": { "integration": config }
        }))
        .unwrap()
    }

    fn fixtures() -> (Submission, FormDefinition, Environment) {
        (
            Submission::pending(
                "sub_9",
                "form_2",
                json!({ "email": "grace@example.com", "company": "Navy" })
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
            FormDefinition { id: "form_2".into(), title: "Leads".into(), ..Default::default() },
            Environment::default(),
        )
    }

    #[tokio::test]
    async fn zapier_payload_carries_submission_and_mapping() {
        let http = Arc::new(MockHttp::responding(200));
        let executor = IntegrationStep::new(Transports::default().with_http(http.clone()));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        executor
            .execute(
                &step(json!({
                    "service": "zapier",
                    "endpoint": "https://hooks.zapier.com/hooks/catch/1/abc",
                    "mapping": { "email": "Email Address", "phone": "Phone" },
                    "additionalData": { "source": "{{formTitle}} form" }
                })),
                &ctx,
            )
            .await
            .expect("integration should succeed");

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        let body: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["formId"], "form_2");
        assert_eq!(body["formTitle"], "Leads");
        assert_eq!(body["submissionId"], "sub_9");
        assert_eq!(body["formData"]["company"], "Navy");
        assert_eq!(body["mappedData"], json!({ "Email Address": "grace@example.com" }));
        assert_eq!(body["source"], "Leads form");
        assert!(!requests[0].headers.contains_key("Authorization"));
    }

    #[tokio::test]
    async fn submitted_and_mapped_values_are_templated_too() {
        let http = Arc::new(MockHttp::responding(200));
        let executor = IntegrationStep::new(Transports::default().with_http(http.clone()));
        let (_, form, env) = fixtures();
        let sub = Submission::pending(
            "sub_11",
            "form_2",
            json!({ "email": "ada@example.com", "ref": "{{submissionId}}", "tags": ["{{formTitle}}", 3] })
                .as_object()
                .cloned()
                .unwrap(),
        );
        let ctx = WorkflowContext::new(&sub, &form, &env);

        executor
            .execute(
                &step(json!({
                    "service": "custom",
                    "endpoint": "https://crm.example.com/leads",
                    "mapping": { "ref": "Reference" },
                    "additionalData": { "meta": { "count": 2, "who": "{{email}}" } }
                })),
                &ctx,
            )
            .await
            .unwrap();

        let body: Value = serde_json::from_str(http.requests()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["formData"]["ref"], "sub_11");
        assert_eq!(body["formData"]["tags"], json!(["Leads", 3]));
        assert_eq!(body["mappedData"]["Reference"], "sub_11");
        assert_eq!(body["meta"], json!({ "count": 2, "who": "ada@example.com" }));
    }

    #[tokio::test]
    async fn api_key_becomes_bearer_unless_authorization_is_set() {
        let http = Arc::new(MockHttp::responding(201));
        let executor = IntegrationStep::new(Transports::default().with_http(http.clone()));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        executor
            .execute(
                &step(json!({ "service": "custom", "endpoint": "https://crm.example.com/leads", "apiKey": "k1" })),
                &ctx,
            )
            .await
            .unwrap();
        executor
            .execute(
                &step(json!({
                    "service": "custom", "endpoint": "https://crm.example.com/leads",
                    "apiKey": "k1", "headers": { "authorization": "Token t" }
                })),
                &ctx,
            )
            .await
            .unwrap();

        let requests = http.requests();
        assert_eq!(requests[0].headers["Authorization"], "Bearer k1");
        assert_eq!(requests[1].headers["authorization"], "Token t");
        assert!(!requests[1].headers.contains_key("Authorization"));
    }

    #[tokio::test]
    async fn failures_are_labelled_by_service() {
        let executor = IntegrationStep::new(Transports::default().with_http(Arc::new(MockHttp::responding(500))));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        let err = executor
            .execute(&step(json!({ "service": "custom", "endpoint": "https://crm.example.com" })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Custom integration failed: 500 Internal Server Error");

        let unreachable = IntegrationStep::new(
            Transports::default().with_http(Arc::new(MockHttp::unreachable("connection reset"))),
        );
        let err = unreachable
            .execute(&step(json!({ "service": "zapier", "endpoint": "https://hooks.zapier.com/x" })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Zapier integration error: connection reset");
    }

    #[tokio::test]
    async fn configuration_errors_are_reported_before_sending() {
        let http = Arc::new(MockHttp::responding(200));
        let executor = IntegrationStep::new(Transports::default().with_http(http.clone()));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        let err = executor
            .execute(&step(json!({ "service": "hubspot", "endpoint": "https://x.example.com" })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported integration service");

        let err = executor
            .execute(&step(json!({ "service": "zapier" })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Integration endpoint not configured");
        assert!(http.requests().is_empty());
    }
}
