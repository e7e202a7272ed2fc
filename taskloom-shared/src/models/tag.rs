/// Tag model and database operations
///
/// Tag names are unique per user and normalized to lowercase before they
/// reach the database. Two requests racing to create the same name rely on
/// the unique constraint as the sole backstop: the second writer receives a
/// conflict. Deleting a tag cascades to `task_tags`, removing every
/// association.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tags (
///     id BIGSERIAL PRIMARY KEY,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     name VARCHAR(100) NOT NULL,
///     color CHAR(7) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (user_id, name)
/// );
///
/// CREATE TABLE task_tags (
///     task_id BIGINT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     tag_id BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
///     PRIMARY KEY (task_id, tag_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Per-user tag
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    /// Unique tag ID
    pub id: i64,

    /// Owning user
    pub user_id: i64,

    /// Tag name (lowercase, unique per user)
    pub name: String,

    /// Hex RGB color, e.g. `#3fb950`
    pub color: String,

    /// When the tag was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new tag
#[derive(Debug, Clone)]
pub struct CreateTag {
    pub user_id: i64,
    /// Normalized to lowercase before insertion
    pub name: String,
    pub color: String,
}

impl Tag {
    /// Creates a new tag
    ///
    /// # Errors
    ///
    /// A duplicate name for the same user violates the unique constraint;
    /// the error boundary maps that to 409.
    pub async fn create(pool: &PgPool, data: CreateTag) -> Result<Self, sqlx::Error> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (user_id, name, color)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, name, color, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.name.to_lowercase())
        .bind(data.color)
        .fetch_one(pool)
        .await?;

        Ok(tag)
    }

    /// Lists a user's tags, alphabetically
    pub async fn list(pool: &PgPool, user_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, user_id, name, color, created_at
            FROM tags
            WHERE user_id = $1
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(tags)
    }

    /// Deletes a tag, scoped to its owner
    ///
    /// Task associations are removed by the `task_tags` cascade. Returns
    /// true if a row was deleted; a repeat delete returns false, which the
    /// API maps to 404.
    pub async fn delete(pool: &PgPool, user_id: i64, tag_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1 AND user_id = $2")
            .bind(tag_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
