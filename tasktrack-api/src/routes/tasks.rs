/// Task endpoints
///
/// Every route is scoped to the signed-in account. A task that exists but
/// belongs to someone else answers exactly like one that does not exist.
///
/// # Endpoints
///
/// - `POST /api/v1/task` - create
/// - `GET /api/v1/task` - list, newest first
/// - `GET /api/v1/task/:id` - fetch one
/// - `PATCH /api/v1/task/:id` - partial update
/// - `DELETE /api/v1/task/:id` - delete
///
/// # Partial updates
///
/// `PATCH` accepts any JSON object. Only `title`, `completed` and `metadata`
/// are applied; other keys are ignored. `metadata` is merged key by key into
/// the stored map rather than replacing it:
///
/// ```json
/// // stored: {"priority": "low", "owner": "ops"}
/// { "metadata": { "priority": "high" } }
/// // result: {"priority": "high", "owner": "ops"}
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::ApiResponse,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tasktrack_shared::{
    auth::session::SessionContext,
    models::task::{CreateTask, Task},
    models::task_update::merge_update,
};
use uuid::Uuid;
use validator::Validate;

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Task as returned to its owner
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub metadata: HashMap<String, String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.to_string(),
            title: task.title,
            completed: task.completed,
            metadata: task.metadata,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Creates a task owned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: body is not valid JSON for this shape
/// - `422 Unprocessable Entity`: title is empty
pub async fn create_task(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TaskResponse>>)> {
    let Json(req) = payload?;
    req.validate()?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(blank_title());
    }

    let task = state
        .store
        .create_task(
            session.account.id,
            CreateTask {
                title,
                completed: req.completed,
                metadata: req.metadata,
            },
            Utc::now().timestamp(),
        )
        .await?;

    tracing::info!(task_id = %task.id, account_id = %session.account.id, "Task created");

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_data("Task created successfully", task.into()),
    ))
}

/// Lists the caller's tasks, newest first
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<ApiResponse<Vec<TaskResponse>>>> {
    let tasks = state.store.list_tasks(session.account.id).await?;

    Ok(ApiResponse::with_data(
        "Tasks fetched successfully",
        tasks.into_iter().map(TaskResponse::from).collect(),
    ))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<TaskResponse>>> {
    let id = parse_task_id(&id)?;

    let task = state
        .store
        .find_task(session.account.id, id)
        .await?
        .ok_or_else(task_not_found)?;

    Ok(ApiResponse::with_data("Task fetched successfully", task.into()))
}

/// Applies a partial update
///
/// # Errors
///
/// - `400 Bad Request`: invalid id, body not an object, or a recognized field
///   has the wrong type
/// - `404 Not Found`: no such task for this account
pub async fn update_task(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<TaskResponse>>> {
    let id = parse_task_id(&id)?;
    let Json(payload) = payload?;
    let owner_id = session.account.id;

    let existing = state
        .store
        .find_task(owner_id, id)
        .await?
        .ok_or_else(task_not_found)?;

    let update = merge_update(&payload, &existing.metadata)?;

    let task = state
        .store
        .update_task(owner_id, id, &update)
        .await?
        .ok_or_else(task_not_found)?;

    Ok(ApiResponse::with_data("Task updated successfully", task.into()))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let id = parse_task_id(&id)?;

    if !state.store.delete_task(session.account.id, id).await? {
        return Err(task_not_found());
    }

    tracing::info!(task_id = %id, account_id = %session.account.id, "Task deleted");

    Ok(ApiResponse::message("Task deleted successfully"))
}

fn parse_task_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid task ID".to_string()))
}

fn task_not_found() -> ApiError {
    ApiError::NotFound("Task not found".to_string())
}

fn blank_title() -> ApiError {
    ApiError::ValidationError(vec![crate::error::ValidationErrorDetail {
        field: "title".to_string(),
        message: "Title is required".to_string(),
    }])
}
