use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use steps::models::FormDefinition;

use super::ApiError;
use crate::store::StoreError;
use crate::AppState;

/// Create or replace a form.  A missing `id` is generated.
pub async fn create(
    State(state): State<AppState>,
    Json(mut body): Json<Value>,
) -> Result<(StatusCode, Json<FormDefinition>), ApiError> {
    let Some(object) = body.as_object_mut() else {
        return Err(ApiError::BadRequest("form must be a JSON object".into()));
    };
    let has_id = object
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !has_id {
        object.insert("id".into(), Value::String(format!("form_{}", Uuid::new_v4().simple())));
    }

    let form: FormDefinition =
        serde_json::from_value(body).map_err(|e| ApiError::BadRequest(format!("invalid form: {e}")))?;
    state.orchestrator.save_form(&form).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<FormDefinition>>, ApiError> {
    Ok(Json(state.orchestrator.store().list_forms().await?))
}

pub async fn get(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<FormDefinition>, ApiError> {
    match state.orchestrator.store().get_form(&id).await {
        Ok(form) => Ok(Json(form)),
        Err(StoreError::NotFound) => Err(ApiError::NotFound("Form")),
        Err(e) => Err(e.into()),
    }
}
