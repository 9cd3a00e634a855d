use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use codevoice_core::generation::{GenerationRequest, TaskStatus};
use codevoice_core::types::{new_task_id, TaskId, Timestamp};
use tokio::sync::RwLock;

use super::{StoreError, TaskStore};
use crate::models::generation_task::{GenerationTask, TaskListQuery};

/// A stored task plus its insertion sequence number (claim/list order).
struct Entry {
    seq: u64,
    task: GenerationTask,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    tasks: HashMap<TaskId, Entry>,
}

/// [`TaskStore`] holding records in process memory.
///
/// Every mutation happens under a single write lock, which makes
/// `claim_next` atomic across concurrent workers in the same process.
#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: RwLock<Inner>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Apply a guarded `running -> to` transition.
    async fn finish(
        &self,
        id: TaskId,
        to: TaskStatus,
        apply: impl FnOnce(&mut GenerationTask),
    ) -> Result<GenerationTask, StoreError> {
        let mut inner = self.inner.write().await;
        let entry = inner.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if !entry.task.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                id,
                from: entry.task.status,
                to,
            });
        }

        let now = Utc::now();
        entry.task.status = to;
        entry.task.completed_at = Some(now);
        entry.task.updated_at = now;
        apply(&mut entry.task);
        Ok(entry.task.clone())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create(
        &self,
        request: &GenerationRequest,
        retry_of: Option<TaskId>,
    ) -> Result<GenerationTask, StoreError> {
        let task = GenerationTask::queued(new_task_id(), request.to_value(), retry_of);

        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.insert(
            task.id,
            Entry {
                seq,
                task: task.clone(),
            },
        );
        Ok(task)
    }

    async fn find(&self, id: TaskId) -> Result<Option<GenerationTask>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .tasks
            .get(&id)
            .map(|entry| entry.task.clone()))
    }

    async fn list(&self, query: &TaskListQuery) -> Result<Vec<GenerationTask>, StoreError> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&Entry> = inner
            .tasks
            .values()
            .filter(|entry| query.status.map_or(true, |s| entry.task.status == s))
            .collect();
        entries.sort_by(|a, b| b.seq.cmp(&a.seq));

        Ok(entries
            .into_iter()
            .skip(query.effective_offset() as usize)
            .take(query.effective_limit() as usize)
            .map(|entry| entry.task.clone())
            .collect())
    }

    async fn claim_next(&self) -> Result<Option<GenerationTask>, StoreError> {
        let mut inner = self.inner.write().await;
        let next = inner
            .tasks
            .values_mut()
            .filter(|entry| entry.task.status == TaskStatus::Queued)
            .min_by_key(|entry| entry.seq);

        Ok(next.map(|entry| {
            let now = Utc::now();
            entry.task.status = TaskStatus::Running;
            entry.task.started_at = Some(now);
            entry.task.updated_at = now;
            entry.task.clone()
        }))
    }

    async fn complete(
        &self,
        id: TaskId,
        result: &serde_json::Value,
    ) -> Result<GenerationTask, StoreError> {
        self.finish(id, TaskStatus::Completed, |task| {
            task.result = Some(result.clone());
        })
        .await
    }

    async fn fail(&self, id: TaskId, error: &str) -> Result<GenerationTask, StoreError> {
        self.finish(id, TaskStatus::Failed, |task| {
            task.error = Some(error.to_string());
        })
        .await
    }

    async fn fail_stale(
        &self,
        started_before: Timestamp,
        error: &str,
    ) -> Result<Vec<GenerationTask>, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut failed = Vec::new();

        for entry in inner.tasks.values_mut() {
            let task = &mut entry.task;
            let stale = task.status == TaskStatus::Running
                && task.started_at.is_some_and(|t| t < started_before);
            if stale {
                task.status = TaskStatus::Failed;
                task.error = Some(error.to_string());
                task.completed_at = Some(now);
                task.updated_at = now;
                failed.push(task.clone());
            }
        }
        Ok(failed)
    }

    async fn purge_terminal_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.tasks.len();
        inner.tasks.retain(|_, entry| {
            let expired = entry.task.status.is_terminal()
                && entry.task.completed_at.is_some_and(|t| t < cutoff);
            !expired
        });
        Ok((before - inner.tasks.len()) as u64)
    }
}
