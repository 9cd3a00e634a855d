/// Generation tasks are keyed by an opaque UUID assigned at enqueue time.
pub type TaskId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh, unique task identifier.
pub fn new_task_id() -> TaskId {
    uuid::Uuid::new_v4()
}
