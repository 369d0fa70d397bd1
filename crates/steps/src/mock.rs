//! Test doubles for the transport traits and for [`StepExecutor`].
//!
//! Each double records what it receives so tests can assert on the exact
//! requests, emails and rows a step produced.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::models::WorkflowStep;
use crate::traits::{StepExecutor, StepOutcome, WorkflowContext};
use crate::transport::{
    HttpRequest, HttpResponse, HttpTransport, Mailer, OutboundEmail, RecordSink, SubmissionRecord,
};
use crate::StepError;

/// Reason phrase for the status codes tests commonly use.
fn canonical_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

enum HttpBehaviour {
    Status(u16),
    Unreachable(String),
}

/// An HTTP transport that answers every request the same way.
pub struct MockHttp {
    behaviour: HttpBehaviour,
    pub calls: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockHttp {
    pub fn responding(status: u16) -> Self {
        Self {
            behaviour: HttpBehaviour::Status(status),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every request fails before a response arrives.
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self {
            behaviour: HttpBehaviour::Unreachable(msg.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(request);
        match &self.behaviour {
            HttpBehaviour::Status(status) => Ok(HttpResponse {
                status: *status,
                reason: canonical_reason(*status).to_owned(),
            }),
            HttpBehaviour::Unreachable(msg) => Err(TransportError::new(msg.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Mail
// ---------------------------------------------------------------------------

pub struct MockMailer {
    failure: Option<String>,
    pub outbox: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl MockMailer {
    pub fn succeeding() -> Self {
        Self { failure: None, outbox: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self { failure: Some(msg.into()), outbox: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Emails accepted so far; failed sends are not recorded.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.outbox.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), TransportError> {
        if let Some(msg) = &self.failure {
            return Err(TransportError::new(msg.clone()));
        }
        self.outbox.lock().unwrap().push(email);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

pub struct MockRecordSink {
    failure: Option<String>,
    pub rows: Arc<Mutex<Vec<SubmissionRecord>>>,
}

impl MockRecordSink {
    pub fn succeeding() -> Self {
        Self { failure: None, rows: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self { failure: Some(msg.into()), rows: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn records(&self) -> Vec<SubmissionRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for MockRecordSink {
    async fn insert(&self, record: SubmissionRecord) -> Result<(), TransportError> {
        if let Some(msg) = &self.failure {
            return Err(TransportError::new(msg.clone()));
        }
        self.rows.lock().unwrap().push(record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Behaviour injected into [`MockStep`] at construction time.
pub enum MockBehaviour {
    Succeed(StepOutcome),
    Fail(String),
    Panic(String),
}

/// A step executor that records the titles of the steps it ran.
pub struct MockStep {
    pub behaviour: MockBehaviour,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockStep {
    pub fn succeeding() -> Self {
        Self::with(MockBehaviour::Succeed(StepOutcome::done()))
    }

    pub fn redirecting(url: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Succeed(StepOutcome::redirect(url)))
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Fail(msg.into()))
    }

    pub fn panicking(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Panic(msg.into()))
    }

    fn with(behaviour: MockBehaviour) -> Self {
        Self { behaviour, calls: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Titles of executed steps, in call order.
    pub fn titles(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepExecutor for MockStep {
    async fn execute(
        &self,
        step: &WorkflowStep,
        _ctx: &WorkflowContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        self.calls.lock().unwrap().push(step.title.clone());
        match &self.behaviour {
            MockBehaviour::Succeed(outcome) => Ok(outcome.clone()),
            MockBehaviour::Fail(msg) => Err(StepError::transport(msg.clone())),
            MockBehaviour::Panic(msg) => panic!("{msg}"),
        }
    }
}
