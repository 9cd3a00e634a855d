//! Repository for the `generation_tasks` table.
//!
//! Status transitions are guarded in SQL: every update names the status it
//! expects to move *from*, so a terminal row can never be rewritten.

use codevoice_core::types::{TaskId, Timestamp};
use sqlx::PgPool;

use crate::models::generation_task::{GenerationTask, GenerationTaskRow, TaskListQuery};
use crate::models::status::{GenerationTaskStatus, StatusId};

/// Column list for `generation_tasks` queries.
const COLUMNS: &str = "\
    id, status_id, request, result, error, retry_of, \
    created_at, started_at, completed_at, updated_at";

/// Terminal statuses: completed, failed.
const TERMINAL_STATUSES: [StatusId; 2] = [
    GenerationTaskStatus::Completed as StatusId,
    GenerationTaskStatus::Failed as StatusId,
];

/// Provides persistence operations for generation tasks.
pub struct GenerationTaskRepo;

impl GenerationTaskRepo {
    /// Insert a new `queued` task.
    pub async fn insert(
        pool: &PgPool,
        id: TaskId,
        request: &serde_json::Value,
        retry_of: Option<TaskId>,
    ) -> Result<GenerationTask, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_tasks (id, status_id, request, retry_of) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, GenerationTaskRow>(&query)
            .bind(id)
            .bind(GenerationTaskStatus::Queued.id())
            .bind(request)
            .bind(retry_of)
            .fetch_one(pool)
            .await?;
        into_task(row)
    }

    /// Find a task by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: TaskId,
    ) -> Result<Option<GenerationTask>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_tasks WHERE id = $1");
        sqlx::query_as::<_, GenerationTaskRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(into_task)
            .transpose()
    }

    /// Atomically move the oldest queued task to `running`.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// claim the same task.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<GenerationTask>, sqlx::Error> {
        let query = format!(
            "UPDATE generation_tasks \
             SET status_id = $1, started_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM generation_tasks \
                 WHERE status_id = $2 \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationTaskRow>(&query)
            .bind(GenerationTaskStatus::Running.id())
            .bind(GenerationTaskStatus::Queued.id())
            .fetch_optional(pool)
            .await?
            .map(into_task)
            .transpose()
    }

    /// Mark a running task as completed with its result payload.
    ///
    /// Returns `None` when the task is missing or not `running`.
    pub async fn complete(
        pool: &PgPool,
        id: TaskId,
        result: &serde_json::Value,
    ) -> Result<Option<GenerationTask>, sqlx::Error> {
        let query = format!(
            "UPDATE generation_tasks \
             SET status_id = $2, result = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationTaskRow>(&query)
            .bind(id)
            .bind(GenerationTaskStatus::Completed.id())
            .bind(result)
            .bind(GenerationTaskStatus::Running.id())
            .fetch_optional(pool)
            .await?
            .map(into_task)
            .transpose()
    }

    /// Mark a running task as failed with an error message.
    ///
    /// No automatic retry is performed. Returns `None` when the task is
    /// missing or not `running`.
    pub async fn fail(
        pool: &PgPool,
        id: TaskId,
        error: &str,
    ) -> Result<Option<GenerationTask>, sqlx::Error> {
        let query = format!(
            "UPDATE generation_tasks \
             SET status_id = $2, error = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationTaskRow>(&query)
            .bind(id)
            .bind(GenerationTaskStatus::Failed.id())
            .bind(error)
            .bind(GenerationTaskStatus::Running.id())
            .fetch_optional(pool)
            .await?
            .map(into_task)
            .transpose()
    }

    /// List tasks newest first with optional status filter and pagination.
    pub async fn list(
        pool: &PgPool,
        params: &TaskListQuery,
    ) -> Result<Vec<GenerationTask>, sqlx::Error> {
        let status_id: Option<StatusId> = params
            .status
            .map(|s| GenerationTaskStatus::from(s).id());

        let query = format!(
            "SELECT {COLUMNS} FROM generation_tasks \
             WHERE ($1::SMALLINT IS NULL OR status_id = $1) \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, GenerationTaskRow>(&query)
            .bind(status_id)
            .bind(params.effective_limit())
            .bind(params.effective_offset())
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(into_task)
            .collect()
    }

    /// Delete terminal tasks that finished before `cutoff`.
    ///
    /// Returns the number of rows removed.
    pub async fn delete_terminal_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM generation_tasks \
             WHERE status_id IN ($1, $2) AND completed_at < $3",
        )
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Fail `running` tasks whose worker has been silent since before
    /// `started_before`, returning the updated rows.
    pub async fn fail_stale_running(
        pool: &PgPool,
        started_before: Timestamp,
        error: &str,
    ) -> Result<Vec<GenerationTask>, sqlx::Error> {
        let query = format!(
            "UPDATE generation_tasks \
             SET status_id = $1, error = $2, completed_at = NOW() \
             WHERE status_id = $3 AND started_at < $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationTaskRow>(&query)
            .bind(GenerationTaskStatus::Failed.id())
            .bind(error)
            .bind(GenerationTaskStatus::Running.id())
            .bind(started_before)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(into_task)
            .collect()
    }
}

/// Convert a raw row, surfacing unknown status ids as decode errors.
fn into_task(row: GenerationTaskRow) -> Result<GenerationTask, sqlx::Error> {
    let id = row.id;
    GenerationTask::try_from(row).map_err(|status_id| {
        sqlx::Error::Decode(format!("task {id} has unknown status_id {status_id}").into())
    })
}
