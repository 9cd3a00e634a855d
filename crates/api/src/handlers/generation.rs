//! Handlers for the `/generation/tasks` resource.

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use codevoice_core::error::CoreError;
use codevoice_core::generation::{GenerationRequest, TaskStatus};
use codevoice_core::task_events::TaskUpdate;
use codevoice_core::types::TaskId;
use codevoice_db::models::generation_task::{GenerationTask, TaskListQuery};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of a successful enqueue or retry.
#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<TaskId>,
}

/// Parse a path id, rejecting malformed values with a JSON 400.
pub fn parse_task_id(raw: &str) -> AppResult<TaskId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid task id '{raw}'")))
}

fn not_found(task_id: TaskId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Generation task",
        id: task_id.to_string(),
    })
}

async fn find_task(state: &AppState, task_id: TaskId) -> AppResult<GenerationTask> {
    state.store.find(task_id).await?.ok_or_else(|| not_found(task_id))
}

/// Fail with 404 unless the task exists.
pub async fn ensure_task_exists(state: &AppState, task_id: TaskId) -> AppResult<()> {
    find_task(state, task_id).await.map(|_| ())
}

/// Persist a queued task, announce it and wake the worker.
async fn enqueue_request(
    state: &AppState,
    request: &GenerationRequest,
    retry_of: Option<TaskId>,
) -> AppResult<GenerationTask> {
    let task = state.store.create(request, retry_of).await?;

    tracing::info!(
        task_id = %task.id,
        kind = request.kind.as_str(),
        retry_of = ?retry_of,
        "Generation task enqueued",
    );

    state.metrics.task(TaskStatus::Queued.as_str());
    state.notifier.notify(&TaskUpdate::queued(task.id)).await;
    state.worker_signal.notify_one();
    Ok(task)
}

/// POST /api/v1/generation/tasks
///
/// Validates the body before anything is stored. Returns 202 with the new
/// task id; the worker picks it up asynchronously.
pub async fn enqueue(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let request = GenerationRequest::parse(&body)?;
    let task = enqueue_request(&state, &request, None).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            task_id: task.id,
            status: task.status,
            retry_of: None,
        }),
    ))
}

/// GET /api/v1/generation/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let task = find_task(&state, parse_task_id(&id)?).await?;
    Ok(Json(DataResponse { data: task }))
}

/// GET /api/v1/generation/tasks?status=&limit=&offset=
///
/// Newest first. `limit` defaults to 50 and is capped at 100. Malformed
/// parameters are a JSON 400 like every other client error.
pub async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<TaskListQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let tasks = state.store.list(&params).await?;
    Ok(Json(DataResponse { data: tasks }))
}

/// POST /api/v1/generation/tasks/{id}/retry
///
/// Re-submits a failed task's request as a new task. The failed record is
/// left untouched. Tasks in any other status yield 409.
pub async fn retry_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let original = find_task(&state, parse_task_id(&id)?).await?;

    if original.status != TaskStatus::Failed {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Only failed tasks can be retried (task is {})",
            original.status
        ))));
    }

    let request = GenerationRequest::from_value(&original.request)
        .map_err(|e| AppError::InternalError(format!("Stored request is invalid: {e}")))?;
    let task = enqueue_request(&state, &request, Some(original.id)).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            task_id: task.id,
            status: task.status,
            retry_of: Some(original.id),
        }),
    ))
}
