//! Storage behind the HTTP surface.
//!
//! `SubmissionStore` hides whether forms, submissions and workflow runs live
//! in Postgres ([`PgStore`]) or in process memory ([`MemoryStore`], used by
//! tests and `serve --in-memory`).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use db::models::{FormRow, NewSubmission, SubmissionRow, WorkflowRunRow};
use db::{DbError, DbPool};
use engine::WorkflowResult;
use steps::models::{FormDefinition, Submission, SubmissionStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => Self::NotFound,
            other => Self::Backend(other.to_string()),
        }
    }
}

/// A finished workflow run, keyed by submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub submission_id: String,
    #[serde(flatten)]
    pub result: WorkflowResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Insert or replace a form.
    async fn save_form(&self, form: &FormDefinition) -> Result<(), StoreError>;
    async fn get_form(&self, id: &str) -> Result<FormDefinition, StoreError>;
    async fn list_forms(&self) -> Result<Vec<FormDefinition>, StoreError>;

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError>;
    async fn update_status(&self, id: &str, status: SubmissionStatus) -> Result<(), StoreError>;
    /// Submissions of one form, newest first.
    async fn list_submissions(&self, form_id: &str) -> Result<Vec<Submission>, StoreError>;

    async fn save_run(&self, run: &WorkflowRun) -> Result<(), StoreError>;
    async fn get_run(&self, submission_id: &str) -> Result<WorkflowRun, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {err}"))
}

fn form_from_row(row: FormRow) -> Result<FormDefinition, StoreError> {
    serde_json::from_value(row.definition).map_err(|e| corrupt(&format!("form {}", row.id), e))
}

fn submission_from_row(row: SubmissionRow) -> Result<Submission, StoreError> {
    let status = row
        .status
        .parse::<SubmissionStatus>()
        .map_err(|e| corrupt(&format!("submission {}", row.id), e))?;
    let serde_json::Value::Object(data) = row.data else {
        return Err(corrupt(&format!("submission {}", row.id), "data is not an object"));
    };
    Ok(Submission {
        id: row.id,
        form_id: row.form_id,
        data,
        submitted_at: row.submitted_at,
        ip_address: row.ip_address,
        user_agent: row.user_agent,
        status,
    })
}

fn run_from_row(row: WorkflowRunRow) -> Result<WorkflowRun, StoreError> {
    let lines = |value: serde_json::Value| -> Result<Vec<String>, StoreError> {
        serde_json::from_value(value).map_err(|e| corrupt(&format!("run {}", row.submission_id), e))
    };
    Ok(WorkflowRun {
        result: WorkflowResult {
            success: row.success,
            errors: lines(row.errors.clone())?,
            logs: lines(row.logs.clone())?,
            redirect_url: row.redirect_url.clone(),
        },
        submission_id: row.submission_id.clone(),
        started_at: row.started_at,
        finished_at: row.finished_at,
    })
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn save_form(&self, form: &FormDefinition) -> Result<(), StoreError> {
        let definition = serde_json::to_value(form).map_err(|e| corrupt("form", e))?;
        db::repository::forms::upsert_form(&self.pool, &form.id, &form.title, &form.description, definition)
            .await?;
        Ok(())
    }

    async fn get_form(&self, id: &str) -> Result<FormDefinition, StoreError> {
        form_from_row(db::repository::forms::get_form(&self.pool, id).await?)
    }

    async fn list_forms(&self) -> Result<Vec<FormDefinition>, StoreError> {
        db::repository::forms::list_forms(&self.pool)
            .await?
            .into_iter()
            .map(form_from_row)
            .collect()
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let status = submission.status.to_string();
        db::repository::submissions::insert_submission(
            &self.pool,
            NewSubmission {
                id: &submission.id,
                form_id: &submission.form_id,
                data: serde_json::Value::Object(submission.data.clone()),
                status: &status,
                ip_address: submission.ip_address.as_deref(),
                user_agent: submission.user_agent.as_deref(),
                submitted_at: submission.submitted_at,
            },
        )
        .await?;
        Ok(())
    }

    async fn update_status(&self, id: &str, status: SubmissionStatus) -> Result<(), StoreError> {
        db::repository::submissions::update_status(&self.pool, id, &status.to_string()).await?;
        Ok(())
    }

    async fn list_submissions(&self, form_id: &str) -> Result<Vec<Submission>, StoreError> {
        db::repository::submissions::list_for_form(&self.pool, form_id)
            .await?
            .into_iter()
            .map(submission_from_row)
            .collect()
    }

    async fn save_run(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        let row = WorkflowRunRow {
            submission_id: run.submission_id.clone(),
            success: run.result.success,
            errors: serde_json::json!(run.result.errors),
            logs: serde_json::json!(run.result.logs),
            redirect_url: run.result.redirect_url.clone(),
            started_at: run.started_at,
            finished_at: run.finished_at,
        };
        db::repository::runs::save_run(&self.pool, &row).await?;
        Ok(())
    }

    async fn get_run(&self, submission_id: &str) -> Result<WorkflowRun, StoreError> {
        run_from_row(db::repository::runs::get_run(&self.pool, submission_id).await?)
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    forms: HashMap<String, FormDefinition>,
    submissions: HashMap<String, Submission>,
    runs: HashMap<String, WorkflowRun>,
}

/// Process-memory store.  Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn save_form(&self, form: &FormDefinition) -> Result<(), StoreError> {
        self.tables.write().await.forms.insert(form.id.clone(), form.clone());
        Ok(())
    }

    async fn get_form(&self, id: &str) -> Result<FormDefinition, StoreError> {
        self.tables.read().await.forms.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_forms(&self) -> Result<Vec<FormDefinition>, StoreError> {
        let mut forms: Vec<FormDefinition> = self.tables.read().await.forms.values().cloned().collect();
        forms.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(forms)
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.forms.contains_key(&submission.form_id) {
            return Err(StoreError::NotFound);
        }
        tables.submissions.insert(submission.id.clone(), submission.clone());
        Ok(())
    }

    async fn update_status(&self, id: &str, status: SubmissionStatus) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let submission = tables.submissions.get_mut(id).ok_or(StoreError::NotFound)?;
        submission.status = status;
        Ok(())
    }

    async fn list_submissions(&self, form_id: &str) -> Result<Vec<Submission>, StoreError> {
        let mut found: Vec<Submission> = self
            .tables
            .read()
            .await
            .submissions
            .values()
            .filter(|s| s.form_id == form_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(found)
    }

    async fn save_run(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .runs
            .insert(run.submission_id.clone(), run.clone());
        Ok(())
    }

    async fn get_run(&self, submission_id: &str) -> Result<WorkflowRun, StoreError> {
        self.tables
            .read()
            .await
            .runs
            .get(submission_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}
