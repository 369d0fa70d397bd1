//! Collaborator traits for everything that leaves the process.
//!
//! Executors never talk to the network directly; they go through these
//! traits so the engine can be wired to real clients in production and to
//! [`crate::mock`] doubles in tests.  Retries, timeouts and pooling are the
//! implementation's business.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::TransportError;
use crate::models::HttpMethod;

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// A `POST` with a JSON body and `Content-Type: application/json`.
    pub fn post_json(url: impl Into<String>, body: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_owned(), "application/json".to_owned());
        Self {
            method: HttpMethod::POST,
            url: url.into(),
            headers,
            body: Some(body.to_string()),
        }
    }

    /// Set a header, replacing any existing one whose name differs only in case.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|h| h.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request.  A non-2xx status is a normal `Ok` response;
    /// `Err` means the request never completed.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// Mail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// Record sink (the `database` action)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub table: String,
    pub form_id: String,
    pub submission_id: String,
    pub form_data: Value,
    pub extra: Value,
    pub submitted_at: DateTime<Utc>,
}

#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn insert(&self, record: SubmissionRecord) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// The collaborators handed to the built-in executors.  `None` means the
/// deployment has no such transport and dependent steps fail.
#[derive(Clone, Default)]
pub struct Transports {
    pub http: Option<Arc<dyn HttpTransport>>,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub records: Option<Arc<dyn RecordSink>>,
}

impl Transports {
    pub fn with_http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_records(mut self, records: Arc<dyn RecordSink>) -> Self {
        self.records = Some(records);
        self
    }
}
