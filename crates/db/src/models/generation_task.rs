//! Generation task entity model and query DTOs.

use codevoice_core::generation::TaskStatus;
use codevoice_core::task_events::TaskUpdate;
use codevoice_core::types::{TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::{GenerationTaskStatus, StatusId};

/// Maximum page size for task listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for task listing.
pub const DEFAULT_LIMIT: i64 = 50;

/// A generation task record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationTask {
    pub id: TaskId,
    pub status: TaskStatus,
    /// The validated request, stored so the worker can rehydrate it.
    pub request: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    /// The failed task this one retries, if any.
    pub retry_of: Option<TaskId>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl GenerationTask {
    /// A fresh `queued` record.
    pub fn queued(id: TaskId, request: serde_json::Value, retry_of: Option<TaskId>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            status: TaskStatus::Queued,
            request,
            result: None,
            error: None,
            retry_of,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// The notification message describing this record.
    ///
    /// `result`/`error` are only carried by the status they belong to.
    pub fn to_update(&self) -> TaskUpdate {
        TaskUpdate {
            task_id: self.id,
            status: self.status,
            result: match self.status {
                TaskStatus::Completed => self.result.clone(),
                _ => None,
            },
            error: match self.status {
                TaskStatus::Failed => self.error.clone(),
                _ => None,
            },
        }
    }
}

/// Raw row from the `generation_tasks` table.
#[derive(Debug, FromRow)]
pub struct GenerationTaskRow {
    pub id: TaskId,
    pub status_id: StatusId,
    pub request: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub retry_of: Option<TaskId>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl TryFrom<GenerationTaskRow> for GenerationTask {
    type Error = StatusId;

    /// Fails with the offending id when `status_id` is not a known status.
    fn try_from(row: GenerationTaskRow) -> Result<Self, Self::Error> {
        let status = GenerationTaskStatus::from_id(row.status_id).ok_or(row.status_id)?;
        Ok(Self {
            id: row.id,
            status: status.into(),
            request: row.request,
            result: row.result,
            error: row.error,
            retry_of: row.retry_of,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            updated_at: row.updated_at,
        })
    }
}

/// Query parameters for `GET /generation/tasks`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TaskListQuery {
    /// Filter by status.
    pub status: Option<TaskStatus>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

impl TaskListQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
