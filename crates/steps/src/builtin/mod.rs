//! Built-in executors for the four step types.

mod action;
mod condition;
mod integration;
mod notification;

pub use action::ActionStep;
pub use condition::ConditionStep;
pub use integration::IntegrationStep;
pub use notification::NotificationStep;

use std::sync::Arc;

use url::Url;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::StepError;

/// Parse `raw` as an absolute `http`/`https` URL.
pub fn absolute_url(raw: &str) -> Result<Url, StepError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| StepError::config(format!("Invalid endpoint URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(StepError::config(format!(
            "Invalid endpoint URL '{raw}': unsupported scheme '{other}'"
        ))),
    }
}

fn http_client(http: &Option<Arc<dyn HttpTransport>>) -> Result<&dyn HttpTransport, StepError> {
    http.as_deref()
        .ok_or_else(|| StepError::config("HTTP client not configured"))
}

/// Send the request and turn transport errors and non-2xx statuses into
/// step failures labelled with `what`.
async fn deliver(
    http: &dyn HttpTransport,
    request: HttpRequest,
    what: &str,
) -> Result<HttpResponse, StepError> {
    let response = http
        .send(request)
        .await
        .map_err(|e| StepError::transport(format!("{what} error: {e}")))?;

    if !response.is_success() {
        let detail = if response.reason.is_empty() {
            response.status.to_string()
        } else {
            format!("{} {}", response.status, response.reason)
        };
        return Err(StepError::transport(format!("{what} failed: {detail}")));
    }
    Ok(response)
}
