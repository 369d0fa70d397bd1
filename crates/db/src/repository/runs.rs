//! Workflow run records, one per submission.

use sqlx::PgPool;

use crate::{models::WorkflowRunRow, DbError};

/// Store the run for `row.submission_id`, replacing any earlier one.
pub async fn save_run(pool: &PgPool, row: &WorkflowRunRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO workflow_runs
            (submission_id, success, errors, logs, redirect_url, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (submission_id) DO UPDATE
            SET success = EXCLUDED.success,
                errors = EXCLUDED.errors,
                logs = EXCLUDED.logs,
                redirect_url = EXCLUDED.redirect_url,
                started_at = EXCLUDED.started_at,
                finished_at = EXCLUDED.finished_at
        "#,
    )
    .bind(&row.submission_id)
    .bind(row.success)
    .bind(&row.errors)
    .bind(&row.logs)
    .bind(&row.redirect_url)
    .bind(row.started_at)
    .bind(row.finished_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_run(pool: &PgPool, submission_id: &str) -> Result<WorkflowRunRow, DbError> {
    sqlx::query_as::<_, WorkflowRunRow>(
        r#"
        SELECT submission_id, success, errors, logs, redirect_url, started_at, finished_at
        FROM workflow_runs WHERE submission_id = $1
        "#,
    )
    .bind(submission_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
