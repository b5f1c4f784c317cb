//! Task processor
//!
//! Turns one listed task into at most one status report:
//! - Claims the task, abandoning it if the claim does not succeed
//! - Runs the work handler under a time limit
//! - Reports `completed` or `failed` depending on how the work ended

use anyhow::{Result, anyhow};
use relay_client::ClaimOutcome;
use relay_core::domain::task::{Task, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

use crate::repository::TaskRepository;
use crate::service::work::WorkHandler;

/// What happened to a task handed to the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Claim rejected or failed; no work ran and no status was sent
    NotClaimed,
    Completed,
    /// Work errored, panicked or timed out
    Failed(String),
}

/// Claims and processes individual tasks
#[derive(Clone)]
pub struct TaskProcessor {
    repository: Arc<dyn TaskRepository>,
    handler: Arc<dyn WorkHandler>,
    work_timeout: Duration,
}

impl TaskProcessor {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        handler: Arc<dyn WorkHandler>,
        work_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            handler,
            work_timeout,
        }
    }

    /// Processes a single task
    ///
    /// Every successful claim is followed by exactly one status update.
    pub async fn process(&self, task: Task) -> ProcessOutcome {
        match self.repository.claim(&task.id).await {
            ClaimOutcome::Claimed => info!("Claimed task {}", task.id),
            ClaimOutcome::Contended { status } => {
                debug!("Task {} taken elsewhere (status {}), skipping", task.id, status);
                return ProcessOutcome::NotClaimed;
            }
            ClaimOutcome::Failed(e) => {
                debug!("Skipping task {}: claim failed: {}", task.id, e);
                return ProcessOutcome::NotClaimed;
            }
        }

        let task_id = task.id.clone();

        let outcome = match self.run_work(task).await {
            Ok(()) => {
                info!("Completed task {}", task_id);
                ProcessOutcome::Completed
            }
            Err(e) => {
                warn!("Task {} failed: {:#}", task_id, e);
                ProcessOutcome::Failed(format!("{:#}", e))
            }
        };

        let status = match outcome {
            ProcessOutcome::Completed => TaskStatus::Completed,
            _ => TaskStatus::Failed,
        };
        self.repository.set_status(&task_id, status).await;

        outcome
    }

    /// Runs the handler on its own task so a panic cannot unwind into the loop
    async fn run_work(&self, task: Task) -> Result<()> {
        let handler = Arc::clone(&self.handler);
        let mut work = tokio::spawn(async move { handler.perform(&task).await });

        match time::timeout(self.work_timeout, &mut work).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) if join_error.is_panic() => Err(anyhow!("work panicked")),
            Ok(Err(join_error)) => Err(anyhow!("work was cancelled: {}", join_error)),
            Err(_) => {
                work.abort();
                Err(anyhow!("work timed out after {:?}", self.work_timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, Journal, MockRepository, ScriptedWork, pending};
    use relay_core::domain::task::TaskId;

    fn processor(repository: MockRepository, work: ScriptedWork) -> TaskProcessor {
        TaskProcessor::new(Arc::new(repository), Arc::new(work), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_claimed_task_is_worked_then_completed() {
        let journal = Journal::default();
        let processor = processor(
            MockRepository::new(journal.clone()),
            ScriptedWork::new(journal.clone()),
        );

        let outcome = processor.process(pending(1)).await;

        assert_eq!(outcome, ProcessOutcome::Completed);
        let id = TaskId::from(1_i64);
        assert_eq!(
            journal.events(),
            vec![
                Event::Claimed(id.clone()),
                Event::Worked(id.clone()),
                Event::StatusSet(id, TaskStatus::Completed),
            ]
        );
    }

    #[tokio::test]
    async fn test_contended_claim_skips_work_and_status() {
        let journal = Journal::default();
        let processor = processor(
            MockRepository::new(journal.clone()).with_claim_status(3, 409),
            ScriptedWork::new(journal.clone()),
        );

        let outcome = processor.process(pending(3)).await;

        assert_eq!(outcome, ProcessOutcome::NotClaimed);
        assert!(journal.events().is_empty());
    }

    #[tokio::test]
    async fn test_failed_claim_skips_work_and_status() {
        let journal = Journal::default();
        let processor = processor(
            MockRepository::new(journal.clone()).with_claim_status(4, 503),
            ScriptedWork::new(journal.clone()),
        );

        assert_eq!(processor.process(pending(4)).await, ProcessOutcome::NotClaimed);
        assert!(journal.events().is_empty());
    }

    #[tokio::test]
    async fn test_work_error_reports_failed_once() {
        let journal = Journal::default();
        let processor = processor(
            MockRepository::new(journal.clone()),
            ScriptedWork::new(journal.clone()).failing_on(2),
        );

        let outcome = processor.process(pending(2)).await;

        match outcome {
            ProcessOutcome::Failed(reason) => assert!(reason.contains("failed")),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(
            journal.count(|e| matches!(e, Event::StatusSet(..))),
            1
        );
        assert_eq!(
            journal.events().last(),
            Some(&Event::StatusSet(TaskId::from(2_i64), TaskStatus::Failed))
        );
    }

    #[tokio::test]
    async fn test_work_panic_reports_failed() {
        let journal = Journal::default();
        let processor = processor(
            MockRepository::new(journal.clone()),
            ScriptedWork::new(journal.clone()).panicking_on(5),
        );

        let outcome = processor.process(pending(5)).await;

        assert_eq!(outcome, ProcessOutcome::Failed("work panicked".to_string()));
        assert_eq!(
            journal.events().last(),
            Some(&Event::StatusSet(TaskId::from(5_i64), TaskStatus::Failed))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_timeout_reports_failed() {
        let journal = Journal::default();
        let processor = TaskProcessor::new(
            Arc::new(MockRepository::new(journal.clone())),
            Arc::new(ScriptedWork::new(journal.clone()).taking(Duration::from_secs(30))),
            Duration::from_secs(1),
        );

        let outcome = processor.process(pending(6)).await;

        match outcome {
            ProcessOutcome::Failed(reason) => assert!(reason.contains("timed out")),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(
            journal.count(|e| *e == Event::StatusSet(TaskId::from(6_i64), TaskStatus::Failed)),
            1
        );
    }
}
