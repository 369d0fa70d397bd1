//! Result types produced by the engine and the validator.
//!
//! Both serialise to the camelCase JSON returned by the HTTP API and stored
//! in the `workflow_runs` table.

use serde::{Deserialize, Serialize};

/// Outcome of one `execute_workflow` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    /// True iff every enabled step succeeded.
    pub success: bool,
    /// One entry per failed step, prefixed with the step title.
    pub errors: Vec<String>,
    /// Audit trail in execution order.
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Structural check of a step list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self { valid: errors.is_empty(), errors }
    }
}
