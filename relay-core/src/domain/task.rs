//! Task domain types

use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;

/// Opaque task identifier
///
/// The orchestrator may hand out numeric or string ids. The worker never
/// interprets them; it only echoes them back in request paths. Numbers are
/// kept exactly as the orchestrator wrote them, floats and u64 included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Number(Number),
    Text(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Number(n) => write!(f, "{}", n),
            TaskId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        TaskId::Number(id.into())
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        TaskId::Number(id.into())
    }
}

impl From<Number> for TaskId {
    fn from(id: Number) -> Self {
        TaskId::Number(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        TaskId::Text(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        TaskId::Text(id)
    }
}

/// Task lifecycle status
///
/// Only `pending` tasks are eligible for claiming. Statuses this worker does
/// not know decode as `Unknown` and are never processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Claimed,
    Completed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Claimed => "claimed",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task snapshot as listed by the orchestrator
///
/// Fields other than `id` and `status` are kept in `extra` so work handlers
/// can inspect them, but the worker itself ignores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    /// Creates a task with no extra fields
    pub fn new(id: impl Into<TaskId>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            status,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}
