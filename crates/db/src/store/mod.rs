//! The task store seam.
//!
//! [`TaskStore`] is the only way the enqueuer, worker, relay and retention
//! sweep touch task records. Implementations enforce the status state
//! machine: `complete`/`fail` only succeed from `running`, and `claim_next`
//! only moves `queued -> running`.
//!
//! - [`PgTaskStore`] persists to Postgres through
//!   [`GenerationTaskRepo`](crate::repositories::GenerationTaskRepo).
//! - [`InMemoryTaskStore`] keeps records in process memory, for tests and
//!   single-process development.

mod memory;
mod postgres;

pub use memory::InMemoryTaskStore;
pub use postgres::PgTaskStore;

use async_trait::async_trait;
use codevoice_core::generation::{GenerationRequest, TaskStatus};
use codevoice_core::types::{TaskId, Timestamp};

use crate::models::generation_task::{GenerationTask, TaskListQuery};

/// Errors raised by a [`TaskStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No task exists with this id.
    #[error("Generation task {0} not found")]
    NotFound(TaskId),

    /// The requested status change is not allowed by the state machine.
    #[error("Invalid status transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Persistence operations on generation tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Verify the backing storage is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Persist a new `queued` task with a freshly generated id.
    async fn create(
        &self,
        request: &GenerationRequest,
        retry_of: Option<TaskId>,
    ) -> Result<GenerationTask, StoreError>;

    /// Read a task record.
    async fn find(&self, id: TaskId) -> Result<Option<GenerationTask>, StoreError>;

    /// List tasks newest first.
    async fn list(&self, query: &TaskListQuery) -> Result<Vec<GenerationTask>, StoreError>;

    /// Atomically claim the oldest queued task, moving it to `running`.
    async fn claim_next(&self) -> Result<Option<GenerationTask>, StoreError>;

    /// `running -> completed`, recording the result.
    async fn complete(
        &self,
        id: TaskId,
        result: &serde_json::Value,
    ) -> Result<GenerationTask, StoreError>;

    /// `running -> failed`, recording the error message.
    async fn fail(&self, id: TaskId, error: &str) -> Result<GenerationTask, StoreError>;

    /// Fail every `running` task started before `started_before`.
    async fn fail_stale(
        &self,
        started_before: Timestamp,
        error: &str,
    ) -> Result<Vec<GenerationTask>, StoreError>;

    /// Delete terminal tasks that finished before `cutoff`.
    async fn purge_terminal_before(&self, cutoff: Timestamp) -> Result<u64, StoreError>;
}
