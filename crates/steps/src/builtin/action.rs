use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::info;

use super::{absolute_url, deliver, http_client};
use crate::models::{ActionConfig, ActionKind, HttpMethod, StepSpec, WorkflowStep};
use crate::transport::{HttpRequest, SubmissionRecord, Transports};
use crate::traits::{StepExecutor, StepOutcome, WorkflowContext};
use crate::StepError;

pub const DEFAULT_RECORD_TABLE: &str = "form_submissions";

/// Webhooks, redirects, record inserts and recorded calculations.
#[derive(Clone)]
pub struct ActionStep {
    transports: Transports,
}

impl ActionStep {
    pub fn new(transports: Transports) -> Self {
        Self { transports }
    }

    async fn webhook(
        &self,
        config: &ActionConfig,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| StepError::config("Webhook endpoint not configured"))?;
        let url = absolute_url(endpoint)?;
        let http = http_client(&self.transports.http)?;

        let method = config.method.unwrap_or_default();
        let body = match (&config.body, method) {
            (_, HttpMethod::GET) => None,
            (Some(body), _) => Some(ctx.render(body)),
            (None, _) => Some(Value::Object(ctx.form_data.clone()).to_string()),
        };

        let mut request = HttpRequest::post_json(url.as_str(), &Value::Null);
        request.method = method;
        request.body = body;
        for (name, value) in &config.headers {
            request.set_header(name.as_str(), ctx.render(value));
        }

        let response = deliver(http, request, "Webhook").await?;
        info!(status = response.status, endpoint = %url, "webhook delivered");
        Ok(StepOutcome::done().note(format!(
            "Webhook {} {} returned {}",
            method.as_str(),
            url,
            response.status
        )))
    }

    async fn insert_record(
        &self,
        config: &ActionConfig,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let sink = self
            .transports
            .records
            .as_deref()
            .ok_or_else(|| StepError::config("Database connection not configured"))?;

        let table = config
            .table_name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_RECORD_TABLE);

        let record = SubmissionRecord {
            table: table.to_owned(),
            form_id: ctx.form.id.clone(),
            submission_id: ctx.submission.id.clone(),
            form_data: Value::Object(ctx.form_data.clone()),
            extra: ctx.render_value(&Value::Object(config.additional_fields.clone())),
            submitted_at: Utc::now(),
        };

        sink.insert(record)
            .await
            .map_err(|e| StepError::transport(format!("Database save error: {e}")))?;
        Ok(StepOutcome::done().note(format!("Submission saved to {table}")))
    }
}

#[async_trait]
impl StepExecutor for ActionStep {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let config = match step.spec() {
            Ok(StepSpec::Action(config)) => config,
            Ok(_) => return Err(StepError::config("No action configuration found")),
            Err(mismatch) => return Err(StepError::config(mismatch.to_string())),
        };

        match config.kind {
            ActionKind::Webhook => self.webhook(config, ctx).await,
            ActionKind::Redirect => {
                let target = config
                    .endpoint
                    .as_deref()
                    .filter(|e| !e.trim().is_empty())
                    .ok_or_else(|| StepError::config("Redirect URL not configured"))?;
                Ok(StepOutcome::redirect(target).note(format!("Redirect set to {target}")))
            }
            ActionKind::Database => self.insert_record(config, ctx).await,
            ActionKind::Calculation => {
                let formula = config
                    .body
                    .as_deref()
                    .or(config.template.as_deref())
                    .unwrap_or_default();
                Ok(StepOutcome::done()
                    .note(format!("Calculation recorded: {}", ctx.render(formula))))
            }
            ActionKind::Unsupported => Err(StepError::config("Unsupported action type")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::mock::{MockHttp, MockRecordSink};
    use crate::models::{FormDefinition, Submission};
    use serde_json::json;
    use std::sync::Arc;

    fn step(config: Value) -> WorkflowStep {
        serde_json::from_value(json!({
            "id": "a1", "type": "action", "title": "Act",
            "config": { "action": config }
        }))
        .unwrap()
    }

    fn fixtures() -> (Submission, FormDefinition, Environment) {
        (
            Submission::pending(
                "sub_3",
                "form_7",
                json!({ "email": "ada@example.com", "qty": 2 }).as_object().cloned().unwrap(),
            ),
            FormDefinition { id: "form_7".into(), title: "Order".into(), ..Default::default() },
            Environment::default(),
        )
    }

    #[tokio::test]
    async fn webhook_sends_resolved_body_and_merged_headers() {
        let http = Arc::new(MockHttp::responding(204));
        let executor = ActionStep::new(Transports::default().with_http(http.clone()));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        executor
            .execute(
                &step(json!({
                    "type": "webhook", "endpoint": "https://hooks.example.com/orders",
                    "method": "PUT", "headers": { "X-Token": "abc" },
                    "body": "{\"email\":\"{{email}}\",\"id\":\"{{submissionId}}\"}"
                })),
                &ctx,
            )
            .await
            .expect("webhook should succeed");

        let sent = &http.requests()[0];
        assert_eq!(sent.method, HttpMethod::PUT);
        assert_eq!(sent.url, "https://hooks.example.com/orders");
        assert_eq!(sent.headers["Content-Type"], "application/json");
        assert_eq!(sent.headers["X-Token"], "abc");
        assert_eq!(
            sent.body.as_deref(),
            Some("{\"email\":\"ada@example.com\",\"id\":\"sub_3\"}")
        );
    }

    #[tokio::test]
    async fn configured_headers_replace_defaults_regardless_of_case() {
        let http = Arc::new(MockHttp::responding(200));
        let executor = ActionStep::new(Transports::default().with_http(http.clone()));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        executor
            .execute(
                &step(json!({
                    "type": "webhook", "endpoint": "https://hooks.example.com/plain",
                    "headers": { "content-type": "text/plain" }, "body": "{{email}}"
                })),
                &ctx,
            )
            .await
            .unwrap();

        let sent = &http.requests()[0];
        let content_types: Vec<_> = sent
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(sent.headers["content-type"], "text/plain");
        assert_eq!(sent.body.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn webhook_without_body_posts_submitted_data() {
        let http = Arc::new(MockHttp::responding(200));
        let executor = ActionStep::new(Transports::default().with_http(http.clone()));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        executor
            .execute(&step(json!({ "type": "webhook", "endpoint": "https://h.example.com" })), &ctx)
            .await
            .unwrap();

        let body: Value = serde_json::from_str(http.requests()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({ "email": "ada@example.com", "qty": 2 }));
    }

    #[tokio::test]
    async fn non_2xx_webhook_carries_status() {
        let executor = ActionStep::new(Transports::default().with_http(Arc::new(MockHttp::responding(404))));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        let err = executor
            .execute(&step(json!({ "type": "webhook", "endpoint": "https://h.example.com" })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Webhook failed: 404 Not Found");
    }

    #[tokio::test]
    async fn malformed_endpoint_fails_before_any_request() {
        let http = Arc::new(MockHttp::responding(200));
        let executor = ActionStep::new(Transports::default().with_http(http.clone()));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        let err = executor
            .execute(&step(json!({ "type": "webhook", "endpoint": "hooks/orders" })), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Config(_)));
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn redirect_sets_url_without_network() {
        let executor = ActionStep::new(Transports::default());
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        let outcome = executor
            .execute(&step(json!({ "type": "redirect", "endpoint": "/thanks" })), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.redirect_url.as_deref(), Some("/thanks"));
    }

    #[tokio::test]
    async fn database_action_writes_one_keyed_row() {
        let sink = Arc::new(MockRecordSink::succeeding());
        let executor = ActionStep::new(Transports::default().with_records(sink.clone()));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        executor
            .execute(
                &step(json!({
                    "type": "database", "additionalFields": { "source": "{{formTitle}}" }
                })),
                &ctx,
            )
            .await
            .unwrap();

        let rows = sink.records();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].table, DEFAULT_RECORD_TABLE);
        assert_eq!((rows[0].form_id.as_str(), rows[0].submission_id.as_str()), ("form_7", "sub_3"));
        assert_eq!(rows[0].extra, json!({ "source": "Order" }));
    }

    #[tokio::test]
    async fn database_action_fails_when_sink_is_down_or_missing() {
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        let down = ActionStep::new(
            Transports::default().with_records(Arc::new(MockRecordSink::failing("connection refused"))),
        );
        let err = down.execute(&step(json!({ "type": "database" })), &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Database save error: connection refused");

        let missing = ActionStep::new(Transports::default());
        let err = missing.execute(&step(json!({ "type": "database" })), &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Database connection not configured");
    }

    #[tokio::test]
    async fn table_names_are_checked_by_the_sink() {
        let sink = Arc::new(MockRecordSink::failing("invalid table name: x; DROP TABLE y"));
        let executor = ActionStep::new(Transports::default().with_records(sink));
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        let err = executor
            .execute(&step(json!({ "type": "database", "tableName": " x; DROP TABLE y " })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Database save error: invalid table name: x; DROP TABLE y");
    }

    #[tokio::test]
    async fn calculation_only_records_the_formula() {
        let executor = ActionStep::new(Transports::default());
        let (sub, form, env) = fixtures();
        let ctx = WorkflowContext::new(&sub, &form, &env);

        let outcome = executor
            .execute(&step(json!({ "type": "calculation", "body": "{{qty}} * 10" })), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.notes, vec!["Calculation recorded: 2 * 10".to_owned()]);
    }
}
