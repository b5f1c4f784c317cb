//! Task DTOs for worker-to-orchestrator requests

use serde::{Deserialize, Serialize};

use crate::domain::task::TaskStatus;

/// Body of `PATCH /tasks/{id}/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}
