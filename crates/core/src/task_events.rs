//! Per-task status notifications.
//!
//! Every status mutation made by the worker is published as a
//! [`TaskUpdate`] on the task-scoped channel returned by [`task_channel`].
//! The relay forwards these messages verbatim to WebSocket clients.

use serde::{Deserialize, Serialize};

use crate::generation::TaskStatus;
use crate::types::TaskId;

/// Default broker channel prefix. Channels are named `{prefix}:{task_id}`.
pub const DEFAULT_CHANNEL_PREFIX: &str = "project_tasks";

/// Error code sent to a relay client when the task record disappears.
pub const ERROR_TASK_NOT_FOUND: &str = "task_not_found";

/// Status message carried on a task channel.
///
/// `result` is present only for `completed`, `error` only for `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskUpdate {
    pub fn queued(task_id: TaskId) -> Self {
        Self::bare(task_id, TaskStatus::Queued)
    }

    pub fn running(task_id: TaskId) -> Self {
        Self::bare(task_id, TaskStatus::Running)
    }

    pub fn completed(task_id: TaskId, result: serde_json::Value) -> Self {
        Self {
            task_id,
            status: TaskStatus::Completed,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(task_id: TaskId, error: impl Into<String>) -> Self {
        Self {
            task_id,
            status: TaskStatus::Failed,
            result: None,
            error: Some(error.into()),
        }
    }

    fn bare(task_id: TaskId, status: TaskStatus) -> Self {
        Self {
            task_id,
            status,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// JSON text as sent over the broker and the WebSocket.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Channel name for a task: `{prefix}:{task_id}`.
pub fn task_channel(prefix: &str, task_id: TaskId) -> String {
    format!("{prefix}:{task_id}")
}

/// Whether a raw channel message ends the relay.
///
/// A message is terminal when its `status` is `completed`/`failed` or when
/// it carries an `error`. Unparseable messages are not terminal.
pub fn is_terminal_message(payload: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) else {
        return false;
    };

    let terminal_status = value
        .get("status")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<TaskStatus>().ok())
        .is_some_and(TaskStatus::is_terminal);

    let has_error = value.get("error").is_some_and(|e| !e.is_null());

    terminal_status || has_error
}

/// Message sent when a relayed task no longer exists.
pub fn not_found_message(task_id: TaskId) -> String {
    serde_json::json!({
        "task_id": task_id,
        "error": ERROR_TASK_NOT_FOUND,
    })
    .to_string()
}
