use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::json;
use tracing::info;

use super::{deliver, http_client};
use crate::models::{HttpMethod, NotificationChannel, NotificationConfig, StepSpec, WorkflowStep};
use crate::transport::{Attachment, HttpRequest, OutboundEmail, Transports};
use crate::traits::{StepExecutor, StepOutcome, WorkflowContext};
use crate::StepError;

const DEFAULT_SLACK_CHANNEL: &str = "#general";
const DEFAULT_SLACK_USERNAME: &str = "Form Builder";
const DEFAULT_SLACK_ICON: &str = ":robot_face:";

/// Sends email, SMS, Slack and push notifications.
#[derive(Clone)]
pub struct NotificationStep {
    transports: Transports,
}

impl NotificationStep {
    pub fn new(transports: Transports) -> Self {
        Self { transports }
    }

    async fn send_email(
        &self,
        config: &NotificationConfig,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let mailer = self
            .transports
            .mailer
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| StepError::config("Email transporter not configured"))?;

        let subject = ctx.render(config.subject.as_deref().unwrap_or_default());
        let html_body = ctx.render(&config.message);
        let data = serde_json::to_string_pretty(ctx.form_data)
            .map_err(|e| StepError::transport(format!("Email failed: {e}")))?;

        let email = OutboundEmail {
            to: recipients(config, ctx),
            subject,
            html_body,
            attachments: vec![Attachment {
                filename: "submission-data.json".to_owned(),
                content_type: "application/json".to_owned(),
                content: data,
            }],
        };

        mailer
            .send(email)
            .await
            .map_err(|e| StepError::transport(format!("Email failed: {e}")))?;

        info!(recipients = config.recipients.len(), "email notification sent");
        Ok(StepOutcome::done().note(format!(
            "Email sent to {} recipient(s)",
            config.recipients.len()
        )))
    }

    async fn send_sms(
        &self,
        config: &NotificationConfig,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let twilio = ctx
            .environment
            .twilio
            .as_ref()
            .ok_or_else(|| StepError::config("SMS configuration missing"))?;
        let http = http_client(&self.transports.http)?;

        let body = ctx.render(&config.message);
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", twilio.account_sid, twilio.auth_token));

        for recipient in recipients(config, ctx) {
            let form = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("To", &recipient)
                .append_pair("From", &twilio.from_number)
                .append_pair("Body", &body)
                .finish();

            let headers = BTreeMap::from([
                (
                    "Content-Type".to_owned(),
                    "application/x-www-form-urlencoded".to_owned(),
                ),
                ("Authorization".to_owned(), format!("Basic {credentials}")),
            ]);
            let request = HttpRequest {
                method: HttpMethod::POST,
                url: twilio.messages_url(),
                headers,
                body: Some(form),
            };

            deliver(http, request, "SMS").await?;
        }

        Ok(StepOutcome::done().note(format!("SMS sent to {} recipient(s)", config.recipients.len())))
    }

    async fn send_slack(
        &self,
        config: &NotificationConfig,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let webhook_url = config
            .webhook_url
            .as_deref()
            .or(ctx.environment.slack_webhook_url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| StepError::config("Slack webhook URL not configured"))?;
        let http = http_client(&self.transports.http)?;

        let payload = json!({
            "text": ctx.render(&config.message),
            "channel": slack_channel(config),
            "username": config.username.as_deref().unwrap_or(DEFAULT_SLACK_USERNAME),
            "icon_emoji": config.icon.as_deref().unwrap_or(DEFAULT_SLACK_ICON),
        });

        deliver(http, HttpRequest::post_json(webhook_url, &payload), "Slack notification").await?;
        Ok(StepOutcome::done().note("Slack notification posted"))
    }

    async fn send_push(
        &self,
        config: &NotificationConfig,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let gateway = ctx
            .environment
            .push_gateway_url
            .as_deref()
            .ok_or_else(|| StepError::config("Push gateway not configured"))?;
        let http = http_client(&self.transports.http)?;

        let payload = json!({
            "recipients": recipients(config, ctx),
            "title": ctx.render(config.subject.as_deref().unwrap_or_default()),
            "body": ctx.render(&config.message),
            "data": {
                "formId": ctx.form.id,
                "submissionId": ctx.submission.id,
            },
        });

        deliver(http, HttpRequest::post_json(gateway, &payload), "Push notification").await?;
        Ok(StepOutcome::done().note(format!(
            "Push notification sent to {} recipient(s)",
            config.recipients.len()
        )))
    }
}

/// Non-blank recipients with placeholders resolved (e.g. `{{email}}`).
fn recipients(config: &NotificationConfig, ctx: &WorkflowContext<'_>) -> Vec<String> {
    config
        .recipients
        .iter()
        .filter(|r| !r.trim().is_empty())
        .map(|r| ctx.render(r.trim()))
        .collect()
}

/// Explicit channel, else the first `#channel`/`@user` recipient.
fn slack_channel(config: &NotificationConfig) -> &str {
    config
        .slack_channel
        .as_deref()
        .or_else(|| {
            config
                .recipients
                .iter()
                .map(|r| r.trim())
                .find(|r| r.starts_with('#') || r.starts_with('@'))
        })
        .unwrap_or(DEFAULT_SLACK_CHANNEL)
}

#[async_trait]
impl StepExecutor for NotificationStep {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let config = match step.spec() {
            Ok(StepSpec::Notification(config)) => config,
            Ok(_) => return Err(StepError::config("No notification configuration found")),
            Err(mismatch) => return Err(StepError::config(mismatch.to_string())),
        };

        if config.recipients.iter().all(|r| r.trim().is_empty()) {
            return Err(StepError::config("No recipients specified"));
        }
        if config.message.trim().is_empty() {
            return Err(StepError::config("No message specified"));
        }

        match config.channel {
            NotificationChannel::Email => self.send_email(config, ctx).await,
            NotificationChannel::Sms => self.send_sms(config, ctx).await,
            NotificationChannel::Slack => self.send_slack(config, ctx).await,
            NotificationChannel::Push => self.send_push(config, ctx).await,
            NotificationChannel::Unsupported => {
                Err(StepError::config("Unsupported notification type"))
            }
        }
    }
}
