use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use engine::{validate_json, ValidationReport, WorkflowResult};
use steps::models::{FormData, FormDefinition, WorkflowStep};

use super::ApiError;
use crate::orchestrator::OrchestratorError;
use crate::store::{StoreError, WorkflowRun};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWorkflowDto {
    pub workflow: Value,
    #[serde(default)]
    pub form_data: FormData,
    pub form: FormDefinition,
}

/// Dry run against caller-supplied data.  Nothing is persisted.
///
/// The workflow is not validated first; step problems come back in the
/// result's `errors` and `logs`.
pub async fn test(
    State(state): State<AppState>,
    Json(dto): Json<TestWorkflowDto>,
) -> Result<Json<WorkflowResult>, ApiError> {
    let steps: Vec<WorkflowStep> = serde_json::from_value(dto.workflow)
        .map_err(|e| ApiError::BadRequest(format!("invalid workflow definition: {e}")))?;
    let result =
        engine::tester::run_with_data(state.orchestrator.engine(), &steps, dto.form_data, &dto.form).await;
    Ok(Json(result))
}

/// Accepts a bare step list or `{ "workflow": [...] }`.
pub async fn validate(Json(body): Json<Value>) -> Json<ValidationReport> {
    let workflow = body.get("workflow").unwrap_or(&body);
    Json(validate_json(workflow))
}

pub async fn status(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowRun>, ApiError> {
    match state.orchestrator.status(&submission_id).await {
        Ok(run) => Ok(Json(run)),
        Err(OrchestratorError::Store(StoreError::NotFound)) => Err(ApiError::NotFound("Workflow run")),
        Err(e) => Err(e.into()),
    }
}
