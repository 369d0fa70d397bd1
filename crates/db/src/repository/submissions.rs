//! Submission storage.

use sqlx::PgPool;

use crate::{
    models::{NewSubmission, SubmissionRow},
    DbError,
};

const COLUMNS: &str = "id, form_id, data, status, ip_address, user_agent, submitted_at";

pub async fn insert_submission(
    pool: &PgPool,
    submission: NewSubmission<'_>,
) -> Result<SubmissionRow, DbError> {
    let sql = format!(
        r#"
        INSERT INTO submissions ({COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, SubmissionRow>(&sql)
        .bind(submission.id)
        .bind(submission.form_id)
        .bind(submission.data)
        .bind(submission.status)
        .bind(submission.ip_address)
        .bind(submission.user_agent)
        .bind(submission.submitted_at)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Set the status of a stored submission.
pub async fn update_status(pool: &PgPool, id: &str, status: &str) -> Result<(), DbError> {
    let result = sqlx::query(r#"UPDATE submissions SET status = $1 WHERE id = $2"#)
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Submissions of one form, newest first.
pub async fn list_for_form(pool: &PgPool, form_id: &str) -> Result<Vec<SubmissionRow>, DbError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM submissions WHERE form_id = $1 ORDER BY submitted_at DESC"
    );
    let rows = sqlx::query_as::<_, SubmissionRow>(&sql)
        .bind(form_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
