use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use steps::models::{FormData, Submission};

use super::ApiError;
use crate::orchestrator::{SubmitRequest, SubmitResponse};
use crate::store::StoreError;
use crate::AppState;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// First hop of `x-forwarded-for`, else `x-real-ip`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header(headers, "x-forwarded-for")
        .and_then(|list| list.split(',').next().map(|ip| ip.trim().to_owned()))
        .or_else(|| header(headers, "x-real-ip"))
}

pub async fn submit(
    Path(form_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(data): Json<FormData>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let request = SubmitRequest {
        data,
        ip_address: client_ip(&headers),
        user_agent: header(&headers, "user-agent"),
    };
    Ok(Json(state.orchestrator.submit(&form_id, request).await?))
}

pub async fn list(
    Path(form_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    let store = state.orchestrator.store();
    match store.get_form(&form_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound) => return Err(ApiError::NotFound("Form")),
        Err(e) => return Err(e.into()),
    }
    Ok(Json(store.list_submissions(&form_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_prefers_the_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.9"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }
}
