//! Production implementations of the step transport traits.
//!
//! - [`ReqwestHttp`]: webhooks, integrations, Slack, push and Twilio calls.
//! - [`SmtpMailer`]: email notifications over SMTP via `lettre`.
//! - [`PgRecordSink`]: rows written by `database` actions.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

use db::DbPool;
use steps::environment::SmtpSettings;
use steps::models::HttpMethod;
use steps::transport::{
    HttpRequest, HttpResponse, HttpTransport, Mailer, OutboundEmail, RecordSink, SubmissionRecord,
};
use steps::TransportError;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::new(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::PATCH => reqwest::Method::PATCH,
        HttpMethod::DELETE => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttp {
    #[instrument(skip_all, fields(method = request.method.as_str(), url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        let status = response.status();
        debug!(status = status.as_u16(), "HTTP response received");

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// SMTP
// ---------------------------------------------------------------------------

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport.  No connection is made until the first send.
    ///
    /// `secure` selects implicit TLS; otherwise the connection is upgraded
    /// with STARTTLS.
    pub fn new(settings: &SmtpSettings) -> Result<Self, TransportError> {
        let builder = if settings.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .map_err(|e| TransportError::new(format!("invalid SMTP host: {e}")))?;

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|e| TransportError::new(format!("invalid sender address: {e}")))?;

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: OutboundEmail) -> Result<Message, TransportError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(email.subject);
        for recipient in &email.to {
            let mailbox = recipient
                .parse::<Mailbox>()
                .map_err(|e| TransportError::new(format!("invalid recipient '{recipient}': {e}")))?;
            builder = builder.to(mailbox);
        }

        let mut body = MultiPart::mixed().singlepart(SinglePart::html(email.html_body));
        for attachment in email.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| TransportError::new(format!("invalid attachment type: {e}")))?;
            body = body.singlepart(
                Attachment::new(attachment.filename).body(attachment.content, content_type),
            );
        }

        builder
            .multipart(body)
            .map_err(|e| TransportError::new(format!("failed to build email: {e}")))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip_all, fields(recipients = email.to.len()))]
    async fn send(&self, email: OutboundEmail) -> Result<(), TransportError> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Postgres record sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgRecordSink {
    pool: DbPool,
}

impl PgRecordSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSink for PgRecordSink {
    #[instrument(skip_all, fields(table = %record.table, submission_id = %record.submission_id))]
    async fn insert(&self, record: SubmissionRecord) -> Result<(), TransportError> {
        db::repository::records::insert_record(
            &self.pool,
            &record.table,
            &record.form_id,
            &record.submission_id,
            record.form_data,
            record.extra,
            record.submitted_at,
        )
        .await
        .map_err(|e| TransportError::new(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reqwest_transport_sends_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/hooks/orders"))
            .and(header("x-token", "abc"))
            .and(body_string("{\"id\":1}"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let http = ReqwestHttp::new(DEFAULT_HTTP_TIMEOUT).unwrap();
        let response = http
            .send(HttpRequest {
                method: HttpMethod::PUT,
                url: format!("{}/hooks/orders", server.uri()),
                headers: BTreeMap::from([("X-Token".to_owned(), "abc".to_owned())]),
                body: Some("{\"id\":1}".to_owned()),
            })
            .await
            .unwrap();

        assert_eq!(response.status, 202);
        assert_eq!(response.reason, "Accepted");
    }

    #[tokio::test]
    async fn error_statuses_are_responses_not_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let http = ReqwestHttp::new(DEFAULT_HTTP_TIMEOUT).unwrap();
        let response = http
            .send(HttpRequest::post_json(server.uri(), &serde_json::json!({})))
            .await
            .unwrap();
        assert!(!response.is_success());
        assert_eq!(response.reason, "Service Unavailable");
    }

    #[tokio::test]
    async fn unreachable_hosts_are_transport_errors() {
        let http = ReqwestHttp::new(Duration::from_secs(2)).unwrap();
        let result = http
            .send(HttpRequest::post_json("http://127.0.0.1:9/", &serde_json::json!({})))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn record_sink_reports_invalid_table_names() {
        let pool = sqlx::PgPool::connect_lazy("postgres://forms@localhost/never_contacted").unwrap();
        let err = PgRecordSink::new(pool)
            .insert(SubmissionRecord {
                table: "x; DROP TABLE y".into(),
                form_id: "form_1".into(),
                submission_id: "sub_1".into(),
                form_data: serde_json::json!({}),
                extra: serde_json::json!({}),
                submitted_at: chrono::Utc::now(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid table name: x; DROP TABLE y");
    }

    #[tokio::test]
    async fn smtp_mailer_rejects_bad_sender_addresses() {
        let settings = SmtpSettings {
            host: "smtp.example.com".into(),
            port: 587,
            secure: false,
            username: "forms".into(),
            password: "secret".into(),
            from: "not an address".into(),
        };
        assert!(SmtpMailer::new(&settings).is_err());

        let settings = SmtpSettings { from: "Forms <forms@example.com>".into(), ..settings };
        let mailer = SmtpMailer::new(&settings).unwrap();
        let message = mailer.build_message(OutboundEmail {
            to: vec!["ada@example.com".into()],
            subject: "New submission".into(),
            html_body: "<p>hi</p>".into(),
            attachments: vec![steps::transport::Attachment {
                filename: "submission-data.json".into(),
                content_type: "application/json".into(),
                content: "{}".into(),
            }],
        });
        assert!(message.is_ok());

        let bad_recipient = mailer.build_message(OutboundEmail {
            to: vec!["nobody".into()],
            subject: "x".into(),
            html_body: String::new(),
            attachments: Vec::new(),
        });
        assert!(bad_recipient.is_err());
    }
}
