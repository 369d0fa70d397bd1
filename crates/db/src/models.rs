//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models and carry no behaviour; the domain types
//! live in the `steps` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// forms
// ---------------------------------------------------------------------------

/// A saved form.  `definition` holds the full editor JSON (pages, elements
/// and workflow).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub definition: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// submissions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubmissionRow {
    pub id: String,
    pub form_id: String,
    pub data: serde_json::Value,
    /// `pending`, `completed` or `failed`.
    pub status: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Insert payload for [`crate::repository::submissions::insert_submission`].
#[derive(Debug, Clone)]
pub struct NewSubmission<'a> {
    pub id: &'a str,
    pub form_id: &'a str,
    pub data: serde_json::Value,
    pub status: &'a str,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub submitted_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_runs
// ---------------------------------------------------------------------------

/// The stored outcome of the workflow run for one submission.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRunRow {
    pub submission_id: String,
    pub success: bool,
    /// JSON array of strings.
    pub errors: serde_json::Value,
    /// JSON array of strings.
    pub logs: serde_json::Value,
    pub redirect_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
