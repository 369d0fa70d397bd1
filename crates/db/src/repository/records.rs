//! Rows written by `database` workflow actions.
//!
//! The target table is chosen per workflow step, so it cannot be a bind
//! parameter.  Names are restricted to plain identifiers and quoted.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

fn quoted_identifier(table: &str) -> Result<String, DbError> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && table.len() <= 63;
    if !valid {
        return Err(DbError::InvalidTable(table.to_owned()));
    }
    Ok(format!("\"{table}\""))
}

/// Insert one row keyed by `(form_id, submission_id)` into `table`.
pub async fn insert_record(
    pool: &PgPool,
    table: &str,
    form_id: &str,
    submission_id: &str,
    form_data: serde_json::Value,
    extra: serde_json::Value,
    submitted_at: DateTime<Utc>,
) -> Result<Uuid, DbError> {
    let sql = format!(
        r#"
        INSERT INTO {} (id, form_id, submission_id, form_data, extra, submitted_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
        quoted_identifier(table)?
    );
    let id = Uuid::new_v4();

    sqlx::query(&sql)
        .bind(id)
        .bind(form_id)
        .bind(submission_id)
        .bind(form_data)
        .bind(extra)
        .bind(submitted_at)
        .execute(pool)
        .await?;

    Ok(id)
}
