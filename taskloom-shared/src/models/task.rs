/// Task model and database operations
///
/// Tasks belong to exactly one user; every read and write here is filtered
/// by owner, so a task that exists but belongs to someone else is
/// indistinguishable from one that does not exist.
///
/// # Lifecycle
///
/// `completed_at` is non-null iff the last status transition landed on
/// `done`: it is set when a task moves into `done`, cleared when it moves
/// out, and untouched by a no-op `done -> done` update. [`Task::update`]
/// owns that rule.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'done', 'cancelled');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high', 'critical');
/// CREATE TYPE task_sentiment AS ENUM ('positive', 'neutral', 'negative');
///
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'todo',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     due_date TIMESTAMPTZ,
///     completed_at TIMESTAMPTZ,
///     ai_summary TEXT,
///     ai_sentiment task_sentiment,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// The storage-level enums are a backstop; the API never submits values
/// outside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started
    Todo,

    /// Being worked on
    InProgress,

    /// Finished; `completed_at` is set while a task holds this status
    Done,

    /// Abandoned without completion
    Cancelled,
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// AI-derived sentiment for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_sentiment", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Parses a sentiment from free-form model output, case-insensitively.
    ///
    /// Anything outside the closed enum yields `None`; enrichment defaults
    /// that to `Neutral`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

/// Task owned by a single user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: i64,

    /// Owning user
    pub user_id: i64,

    /// Title
    pub title: String,

    /// Optional longer description
    pub description: Option<String>,

    /// Current status
    pub status: TaskStatus,

    /// Priority
    pub priority: TaskPriority,

    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,

    /// Set while status is `done`, cleared otherwise
    pub completed_at: Option<DateTime<Utc>>,

    /// AI-derived summary, filled in by enrichment after creation
    pub ai_summary: Option<String>,

    /// AI-derived sentiment
    pub ai_sentiment: Option<Sentiment>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Defaults to `todo` when absent
    pub status: Option<TaskStatus>,
    /// Defaults to `medium` when absent
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Input for partially updating a task
///
/// All fields are optional; outer `None` means "leave unchanged", and for
/// the nullable columns `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateTask {
    /// True when no field is set; the API rejects such updates with 400
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}

/// Filter and pagination for list queries
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Case-insensitive substring match over title and description
    pub search: Option<String>,
    pub due_before: Option<DateTime<Utc>>,
    /// 1-based page number
    pub page: u32,
    /// Page size, capped by the API at 100
    pub limit: u32,
}

impl TaskFilter {
    /// Default page size applied when the query string omits `limit`
    pub const DEFAULT_LIMIT: u32 = 20;

    /// The default, unfiltered, first-page query, the only list query the
    /// cache stores
    pub fn is_default(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.search.is_none()
            && self.due_before.is_none()
            && self.page <= 1
            && self.limit == Self::DEFAULT_LIMIT
    }
}

/// A list page together with the total row count for the same filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: i64,
}

impl Task {
    /// Creates a new task
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (user_id, title, description, status, priority, due_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, title, description, status, priority, due_date,
                      completed_at, ai_summary, ai_sentiment, created_at, updated_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status.unwrap_or(TaskStatus::Todo))
        .bind(data.priority.unwrap_or(TaskPriority::Medium))
        .bind(data.due_date)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Finds a task by ID, scoped to its owner
    ///
    /// Returns `None` both when the task does not exist and when it belongs
    /// to another user.
    pub async fn find_by_id(
        pool: &PgPool,
        user_id: i64,
        task_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, title, description, status, priority, due_date,
                   completed_at, ai_summary, ai_sentiment, created_at, updated_at
            FROM tasks
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Lists a user's tasks with filters and pagination
    ///
    /// Rows are ordered newest-first. The returned page carries the total
    /// count for the same filter so callers can compute `hasMore`.
    pub async fn list(
        pool: &PgPool,
        user_id: i64,
        filter: &TaskFilter,
    ) -> Result<TaskPage, sqlx::Error> {
        // Build the WHERE clause once, shared by the page and count queries
        let mut conditions = String::from("WHERE user_id = $1");
        let mut bind_count = 1;

        if filter.status.is_some() {
            bind_count += 1;
            conditions.push_str(&format!(" AND status = ${}", bind_count));
        }
        if filter.priority.is_some() {
            bind_count += 1;
            conditions.push_str(&format!(" AND priority = ${}", bind_count));
        }
        if filter.search.is_some() {
            bind_count += 1;
            conditions.push_str(&format!(
                " AND (title ILIKE ${0} OR description ILIKE ${0})",
                bind_count
            ));
        }
        if filter.due_before.is_some() {
            bind_count += 1;
            conditions.push_str(&format!(" AND due_date < ${}", bind_count));
        }

        let page = filter.page.max(1);
        let limit = filter.limit.max(1);
        let offset = (page - 1) as i64 * limit as i64;

        let select = format!(
            r#"
            SELECT id, user_id, title, description, status, priority, due_date,
                   completed_at, ai_summary, ai_sentiment, created_at, updated_at
            FROM tasks
            {}
            ORDER BY created_at DESC, id DESC
            LIMIT ${} OFFSET ${}
            "#,
            conditions,
            bind_count + 1,
            bind_count + 2
        );

        let count = format!("SELECT COUNT(*) FROM tasks {}", conditions);

        let mut select_q = sqlx::query_as::<_, Task>(&select).bind(user_id);
        let mut count_q = sqlx::query_as::<_, (i64,)>(&count).bind(user_id);

        if let Some(status) = filter.status {
            select_q = select_q.bind(status);
            count_q = count_q.bind(status);
        }
        if let Some(priority) = filter.priority {
            select_q = select_q.bind(priority);
            count_q = count_q.bind(priority);
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{}%", search);
            select_q = select_q.bind(pattern.clone());
            count_q = count_q.bind(pattern);
        }
        if let Some(due_before) = filter.due_before {
            select_q = select_q.bind(due_before);
            count_q = count_q.bind(due_before);
        }

        let tasks = select_q
            .bind(limit as i64)
            .bind(offset)
            .fetch_all(pool)
            .await?;
        let (total,) = count_q.fetch_one(pool).await?;

        Ok(TaskPage { tasks, total })
    }

    /// Partially updates a task, scoped to its owner
    ///
    /// Applies the `completed_at` transition rule: moving into `done` stamps
    /// it, moving out clears it, `done -> done` leaves it unchanged.
    ///
    /// Returns `None` if the task is absent or owned by someone else.
    pub async fn update(
        pool: &PgPool,
        user_id: i64,
        task_id: i64,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        // The transition rule needs the current status
        let Some(current) = Self::find_by_id(pool, user_id, task_id).await? else {
            return Ok(None);
        };

        let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }
        if data.priority.is_some() {
            bind_count += 1;
            query.push_str(&format!(", priority = ${}", bind_count));
        }
        if data.due_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", due_date = ${}", bind_count));
        }

        if let Some(new_status) = data.status {
            if new_status == TaskStatus::Done && current.status != TaskStatus::Done {
                query.push_str(", completed_at = NOW()");
            } else if new_status != TaskStatus::Done && current.status == TaskStatus::Done {
                query.push_str(", completed_at = NULL");
            }
        }

        query.push_str(
            " WHERE id = $1 AND user_id = $2 \
             RETURNING id, user_id, title, description, status, priority, due_date, \
             completed_at, ai_summary, ai_sentiment, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, Task>(&query).bind(task_id).bind(user_id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }
        if let Some(priority) = data.priority {
            q = q.bind(priority);
        }
        if let Some(due_date) = data.due_date {
            q = q.bind(due_date);
        }

        let task = q.fetch_optional(pool).await?;

        Ok(task)
    }

    /// Deletes a task, scoped to its owner
    ///
    /// Returns true if a row was deleted. Deleting an already-deleted task
    /// returns false, which the API maps to 404.
    pub async fn delete(pool: &PgPool, user_id: i64, task_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Persists AI-derived fields after enrichment completes
    pub async fn set_enrichment(
        pool: &PgPool,
        task_id: i64,
        summary: &str,
        sentiment: Sentiment,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET ai_summary = $2, ai_sentiment = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .bind(summary)
        .bind(sentiment)
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            r#""in_progress""#
        );
        assert_eq!(serde_json::to_string(&TaskStatus::Todo).unwrap(), r#""todo""#);

        let back: TaskStatus = serde_json::from_str(r#""cancelled""#).unwrap();
        assert_eq!(back, TaskStatus::Cancelled);
    }

    #[test]
    fn test_priority_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskPriority::Critical).unwrap(),
            r#""critical""#
        );
        let back: TaskPriority = serde_json::from_str(r#""medium""#).unwrap();
        assert_eq!(back, TaskPriority::Medium);
    }

    #[test]
    fn test_sentiment_parse() {
        assert_eq!(Sentiment::parse("positive"), Some(Sentiment::Positive));
        assert_eq!(Sentiment::parse("  Neutral "), Some(Sentiment::Neutral));
        assert_eq!(Sentiment::parse("NEGATIVE"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::parse("ecstatic"), None);
        assert_eq!(Sentiment::parse(""), None);
    }

    #[test]
    fn test_update_is_empty() {
        assert!(UpdateTask::default().is_empty());
        assert!(!UpdateTask {
            status: Some(TaskStatus::Done),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_filter_is_default() {
        let mut filter = TaskFilter {
            page: 1,
            limit: 20,
            ..Default::default()
        };
        assert!(filter.is_default());

        filter.page = 2;
        assert!(!filter.is_default());

        filter.page = 1;
        filter.search = Some("x".to_string());
        assert!(!filter.is_default());

        // A non-default page size is not cacheable either
        let custom_limit = TaskFilter {
            page: 1,
            limit: 50,
            ..Default::default()
        };
        assert!(!custom_limit.is_default());
    }
}
