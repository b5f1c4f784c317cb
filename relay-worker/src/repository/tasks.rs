//! Task repository
//!
//! Handles communication with the orchestrator for task operations:
//! - Listing pending tasks
//! - Claiming tasks
//! - Reporting task status

use async_trait::async_trait;
use relay_client::{ClaimOutcome, OrchestratorClient, TaskListing};
use relay_core::domain::task::{TaskId, TaskStatus};

/// Repository trait for task operations with the orchestrator
///
/// None of these operations fail: listing degrades to an empty result,
/// claims report why they did not succeed, status updates are best-effort.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Fetches tasks currently pending for this tenant
    async fn list_pending(&self) -> TaskListing;

    /// Attempts to claim a task for this worker
    ///
    /// # Arguments
    /// * `task_id` - The ID of the task to claim
    async fn claim(&self, task_id: &TaskId) -> ClaimOutcome;

    /// Reports the status of a claimed task
    ///
    /// # Arguments
    /// * `task_id` - The ID of the task to update
    /// * `status` - The new status
    async fn set_status(&self, task_id: &TaskId, status: TaskStatus);
}

#[async_trait]
impl TaskRepository for OrchestratorClient {
    async fn list_pending(&self) -> TaskListing {
        OrchestratorClient::list_pending(self).await
    }

    async fn claim(&self, task_id: &TaskId) -> ClaimOutcome {
        self.try_claim(task_id).await
    }

    async fn set_status(&self, task_id: &TaskId, status: TaskStatus) {
        OrchestratorClient::set_status(self, task_id, status).await
    }
}
