//! Status ids for the `generation_task_statuses` lookup table.
//!
//! Each variant's discriminant matches the seed data in the migration.

use codevoice_core::generation::TaskStatus;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Database-side mirror of [`TaskStatus`].
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationTaskStatus {
    Queued = 1,
    Running = 2,
    Completed = 3,
    Failed = 4,
}

impl GenerationTaskStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Resolve a database status ID, `None` for unknown ids.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Queued),
            2 => Some(Self::Running),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            _ => None,
        }
    }
}

impl From<TaskStatus> for GenerationTaskStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Queued => Self::Queued,
            TaskStatus::Running => Self::Running,
            TaskStatus::Completed => Self::Completed,
            TaskStatus::Failed => Self::Failed,
        }
    }
}

impl From<GenerationTaskStatus> for TaskStatus {
    fn from(status: GenerationTaskStatus) -> Self {
        match status {
            GenerationTaskStatus::Queued => TaskStatus::Queued,
            GenerationTaskStatus::Running => TaskStatus::Running,
            GenerationTaskStatus::Completed => TaskStatus::Completed,
            GenerationTaskStatus::Failed => TaskStatus::Failed,
        }
    }
}

impl From<GenerationTaskStatus> for StatusId {
    fn from(value: GenerationTaskStatus) -> Self {
        value as StatusId
    }
}
