use async_trait::async_trait;
use codevoice_core::generation::{GenerationRequest, TaskStatus};
use codevoice_core::types::{new_task_id, TaskId, Timestamp};

use super::{StoreError, TaskStore};
use crate::models::generation_task::{GenerationTask, TaskListQuery};
use crate::repositories::GenerationTaskRepo;
use crate::DbPool;

/// [`TaskStore`] backed by the `generation_tasks` table.
#[derive(Clone)]
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Explain why a guarded update matched no row.
    async fn rejected_transition(&self, id: TaskId, to: TaskStatus) -> StoreError {
        match GenerationTaskRepo::find_by_id(&self.pool, id).await {
            Ok(Some(task)) => StoreError::InvalidTransition {
                id,
                from: task.status,
                to,
            },
            Ok(None) => StoreError::NotFound(id),
            Err(e) => StoreError::Database(e),
        }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create(
        &self,
        request: &GenerationRequest,
        retry_of: Option<TaskId>,
    ) -> Result<GenerationTask, StoreError> {
        let task =
            GenerationTaskRepo::insert(&self.pool, new_task_id(), &request.to_value(), retry_of)
                .await?;
        Ok(task)
    }

    async fn find(&self, id: TaskId) -> Result<Option<GenerationTask>, StoreError> {
        Ok(GenerationTaskRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list(&self, query: &TaskListQuery) -> Result<Vec<GenerationTask>, StoreError> {
        Ok(GenerationTaskRepo::list(&self.pool, query).await?)
    }

    async fn claim_next(&self) -> Result<Option<GenerationTask>, StoreError> {
        Ok(GenerationTaskRepo::claim_next(&self.pool).await?)
    }

    async fn complete(
        &self,
        id: TaskId,
        result: &serde_json::Value,
    ) -> Result<GenerationTask, StoreError> {
        match GenerationTaskRepo::complete(&self.pool, id, result).await? {
            Some(task) => Ok(task),
            None => Err(self.rejected_transition(id, TaskStatus::Completed).await),
        }
    }

    async fn fail(&self, id: TaskId, error: &str) -> Result<GenerationTask, StoreError> {
        match GenerationTaskRepo::fail(&self.pool, id, error).await? {
            Some(task) => Ok(task),
            None => Err(self.rejected_transition(id, TaskStatus::Failed).await),
        }
    }

    async fn fail_stale(
        &self,
        started_before: Timestamp,
        error: &str,
    ) -> Result<Vec<GenerationTask>, StoreError> {
        Ok(GenerationTaskRepo::fail_stale_running(&self.pool, started_before, error).await?)
    }

    async fn purge_terminal_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        Ok(GenerationTaskRepo::delete_terminal_before(&self.pool, cutoff).await?)
    }
}
