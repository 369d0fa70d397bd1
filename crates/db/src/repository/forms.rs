//! Form CRUD operations.

use chrono::Utc;
use sqlx::PgPool;

use crate::{models::FormRow, DbError};

/// Insert a form, or replace the stored definition when `id` already exists.
pub async fn upsert_form(
    pool: &PgPool,
    id: &str,
    title: &str,
    description: &str,
    definition: serde_json::Value,
) -> Result<FormRow, DbError> {
    let now = Utc::now();

    let row = sqlx::query_as::<_, FormRow>(
        r#"
        INSERT INTO forms (id, title, description, definition, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title,
                description = EXCLUDED.description,
                definition = EXCLUDED.definition,
                updated_at = EXCLUDED.updated_at
        RETURNING id, title, description, definition, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(definition)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single form by id.
pub async fn get_form(pool: &PgPool, id: &str) -> Result<FormRow, DbError> {
    sqlx::query_as::<_, FormRow>(
        r#"
        SELECT id, title, description, definition, created_at, updated_at
        FROM forms WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// All forms, most recently updated first.
pub async fn list_forms(pool: &PgPool) -> Result<Vec<FormRow>, DbError> {
    let rows = sqlx::query_as::<_, FormRow>(
        r#"
        SELECT id, title, description, definition, created_at, updated_at
        FROM forms ORDER BY updated_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
