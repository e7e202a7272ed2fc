/// Task CRUD endpoints
///
/// Reads follow the cache-aside protocol (default list query and single
/// items only); every write invalidates the affected snapshots before the
/// response goes out. Creation also hands the new task to the enricher,
/// which runs detached from the request.

use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use taskloom_shared::cache::task_cache::TaskCache;
use taskloom_shared::models::task::{
    CreateTask, Task, TaskFilter, TaskPage, TaskPriority, TaskStatus, UpdateTask,
};

use crate::app::{AppState, AuthContext};
use crate::envelope::{self, ListMeta};
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};

/// Hard ceiling on page size
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub search: Option<String>,
    pub due_before: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListQuery {
    /// Normalizes raw query parameters: page floors at 1, limit is capped
    /// and defaults to the cacheable page size
    fn into_filter(self) -> TaskFilter {
        TaskFilter {
            status: self.status,
            priority: self.priority,
            search: self.search.filter(|s| !s.trim().is_empty()),
            due_before: self.due_before,
            page: self.page.unwrap_or(1).max(1),
            limit: self
                .limit
                .unwrap_or(TaskFilter::DEFAULT_LIMIT)
                .clamp(1, MAX_LIMIT),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update body
///
/// Distinguishes "field absent" (leave unchanged) from "field null" (clear
/// it) for the nullable columns via the double-`Option` pattern.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Deserializes a present-but-possibly-null field as `Some(inner)`;
/// absent fields fall back to the `default` of `None`
fn present_or_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateTaskRequest {
    fn into_update(self) -> Result<UpdateTask, ApiError> {
        if let Some(ref title) = self.title {
            if title.is_empty() || title.chars().count() > 200 {
                return Err(ApiError::BadRequest(
                    "Title must be 1-200 characters".into(),
                ));
            }
        }

        let update = UpdateTask {
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
        };

        if update.is_empty() {
            return Err(ApiError::BadRequest(
                "At least one field must be provided".into(),
            ));
        }

        Ok(update)
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
}

/// GET /tasks
///
/// The default query (no filters, page 1, default limit) is served
/// cache-aside; anything else goes straight to Postgres.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let filter = query.into_filter();
    let cacheable = filter.is_default();
    let key = TaskCache::list_key(auth.user_id);

    if cacheable {
        if let Some(page) = state.task_cache.get_snapshot::<TaskPage>(&key).await {
            tracing::debug!(user_id = auth.user_id, "Task list served from cache");
            let meta = ListMeta::new(filter.page, filter.limit, page.total);
            return Ok(envelope::paginated(page.tasks, meta));
        }
    }

    let page = Task::list(&state.db, auth.user_id, &filter).await?;

    if cacheable {
        state.task_cache.put_snapshot(&key, &page).await;
    }

    let meta = ListMeta::new(filter.page, filter.limit, page.total);
    Ok(envelope::paginated(page.tasks, meta))
}

/// POST /tasks
///
/// Creates the task, invalidates the list snapshot, then detaches the AI
/// enrichment job. The 201 response never waits on enrichment.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Response, ApiError> {
    body.validate()
        .map_err(|e| ApiError::BadRequest(super::auth::flatten_validation(&e)))?;

    let task = Task::create(
        &state.db,
        CreateTask {
            user_id: auth.user_id,
            title: body.title,
            description: body.description,
            status: body.status,
            priority: body.priority,
            due_date: body.due_date,
        },
    )
    .await?;

    state.task_cache.invalidate_list(auth.user_id).await;

    if let Some(ref enricher) = state.enricher {
        enricher
            .clone()
            .spawn(state.db.clone(), state.task_cache.clone(), task.clone());
    }

    tracing::info!(user_id = auth.user_id, task_id = task.id, "Task created");

    Ok(envelope::created(task))
}

/// GET /tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<i64>,
) -> Result<Response, ApiError> {
    let key = TaskCache::item_key(auth.user_id, task_id);

    if let Some(task) = state.task_cache.get_snapshot::<Task>(&key).await {
        tracing::debug!(user_id = auth.user_id, task_id, "Task served from cache");
        return Ok(envelope::ok(task));
    }

    let task = Task::find_by_id(&state.db, auth.user_id, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    state.task_cache.put_snapshot(&key, &task).await;

    Ok(envelope::ok(task))
}

/// PATCH /tasks/:id
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<i64>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Response, ApiError> {
    let update = body.into_update()?;

    let task = Task::update(&state.db, auth.user_id, task_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    state.task_cache.invalidate_list(auth.user_id).await;
    state.task_cache.invalidate_item(auth.user_id, task_id).await;

    tracing::info!(user_id = auth.user_id, task_id, "Task updated");

    Ok(envelope::ok(task))
}

/// DELETE /tasks/:id
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<i64>,
) -> Result<Response, ApiError> {
    let deleted = Task::delete(&state.db, auth.user_id, task_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Task not found".into()));
    }

    state.task_cache.invalidate_list(auth.user_id).await;
    state.task_cache.invalidate_item(auth.user_id, task_id).await;

    tracing::info!(user_id = auth.user_id, task_id, "Task deleted");

    Ok(envelope::ok(DeleteResponse {
        message: "Task deleted",
    }))
}
