//! Task-related API endpoints

use relay_core::domain::task::{Task, TaskId, TaskStatus};
use relay_core::dto::task::UpdateStatusRequest;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::OrchestratorClient;
use crate::error::{ClientError, Result};

/// Outcome of listing pending tasks
///
/// Listing never fails from the caller's point of view, but the variants
/// keep "nothing pending" apart from "could not tell".
#[derive(Debug)]
pub enum TaskListing {
    /// The orchestrator answered with a task array (possibly empty)
    Tasks(Vec<Task>),
    /// The body was not JSON, or not an array
    Malformed(String),
    /// Transport failure or non-success HTTP status
    Unavailable(ClientError),
}

impl TaskListing {
    pub fn tasks(&self) -> &[Task] {
        match self {
            TaskListing::Tasks(tasks) => tasks,
            _ => &[],
        }
    }

    pub fn into_tasks(self) -> Vec<Task> {
        match self {
            TaskListing::Tasks(tasks) => tasks,
            _ => Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, TaskListing::Tasks(_))
    }
}

/// Outcome of a claim attempt
#[derive(Debug)]
pub enum ClaimOutcome {
    /// The orchestrator assigned the task to us
    Claimed,
    /// Task is gone or already claimed elsewhere (404 / 409)
    Contended { status: u16 },
    /// Anything else: transport errors, 5xx after retries, other 4xx
    Failed(ClientError),
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimOutcome::Claimed)
    }
}

impl OrchestratorClient {
    // =============================================================================
    // Listing
    // =============================================================================

    /// List every task visible to this tenant
    ///
    /// Array entries that do not decode as a task are skipped with a warning.
    /// An array in which no entry decodes is a parse error.
    ///
    /// # Returns
    /// All tasks in orchestrator order, regardless of status
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let url = self.endpoint(&["tasks"])?;
        let response = self.send(|| self.request(Method::GET, url.clone())).await?;

        let body: Value = self.handle_response(response).await?;
        parse_task_array(body)
    }

    /// List pending tasks without ever failing
    ///
    /// Malformed bodies and transport or HTTP failures are logged and
    /// degrade to an empty task list; the variant says which happened.
    pub async fn list_pending(&self) -> TaskListing {
        match self.list_tasks().await {
            Ok(tasks) => TaskListing::Tasks(tasks.into_iter().filter(Task::is_pending).collect()),
            Err(ClientError::ParseError(reason)) => {
                warn!("Received malformed response from tasks endpoint: {}", reason);
                TaskListing::Malformed(reason)
            }
            Err(e) => {
                warn!("Error fetching tasks: {}", e);
                TaskListing::Unavailable(e)
            }
        }
    }

    // =============================================================================
    // Claiming
    // =============================================================================

    /// Attempt to claim a task, reporting why a claim did not succeed
    pub async fn try_claim(&self, task_id: &TaskId) -> ClaimOutcome {
        match self.claim_request(task_id).await {
            Ok(()) => ClaimOutcome::Claimed,
            Err(e) if e.is_contention() => {
                debug!("Task {} already claimed or gone: {}", task_id, e);
                ClaimOutcome::Contended {
                    status: e.status().unwrap_or_default(),
                }
            }
            Err(e) => {
                warn!("Error claiming task {}: {}", task_id, e);
                ClaimOutcome::Failed(e)
            }
        }
    }

    /// Claim a task
    ///
    /// # Returns
    /// `true` iff the orchestrator answered with a success status
    pub async fn claim(&self, task_id: &TaskId) -> bool {
        self.try_claim(task_id).await.is_claimed()
    }

    async fn claim_request(&self, task_id: &TaskId) -> Result<()> {
        let id = task_id.to_string();
        let url = self.endpoint(&["tasks", &id, "claim"])?;
        let response = self.send(|| self.request(Method::POST, url.clone())).await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Status Updates
    // =============================================================================

    /// Update the status of a task
    ///
    /// # Arguments
    /// * `task_id` - The task to update
    /// * `status` - The new status
    pub async fn update_status(&self, task_id: &TaskId, status: TaskStatus) -> Result<()> {
        let id = task_id.to_string();
        let url = self.endpoint(&["tasks", &id, "status"])?;
        let body = UpdateStatusRequest { status };
        let response = self
            .send(|| self.request(Method::PATCH, url.clone()).json(&body))
            .await?;

        self.handle_empty_response(response).await
    }

    /// Best-effort status update; failures are logged and dropped
    pub async fn set_status(&self, task_id: &TaskId, status: TaskStatus) {
        if let Err(e) = self.update_status(task_id, status).await {
            warn!(
                "Error updating task {} status to {}: {}",
                task_id, status, e
            );
        }
    }
}

fn parse_task_array(body: Value) -> Result<Vec<Task>> {
    let Value::Array(items) = body else {
        return Err(ClientError::ParseError(format!(
            "expected a JSON array of tasks, got {}",
            describe(&body)
        )));
    };

    let total = items.len();
    let mut tasks = Vec::with_capacity(total);
    let mut last_error = None;

    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Task>(item) {
            Ok(task) => tasks.push(task),
            Err(e) => {
                debug!("Task entry {} could not be decoded: {}", index, e);
                last_error = Some(e);
            }
        }
    }

    let skipped = total - tasks.len();
    if let Some(e) = last_error {
        if tasks.is_empty() {
            return Err(ClientError::ParseError(format!(
                "none of the {} task entries could be decoded: {}",
                total, e
            )));
        }
        warn!(
            "Skipped {} of {} task entries that could not be decoded: {}",
            skipped, total, e
        );
    }

    Ok(tasks)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
