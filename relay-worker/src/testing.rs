//! In-memory repository and work handlers for processor and scheduler tests

use anyhow::{Result, bail};
use async_trait::async_trait;
use relay_client::{ClaimOutcome, ClientError, TaskListing};
use relay_core::domain::task::{Task, TaskId, TaskStatus};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::repository::TaskRepository;
use crate::service::WorkHandler;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Listed,
    Claimed(TaskId),
    Worked(TaskId),
    StatusSet(TaskId, TaskStatus),
}

/// Ordered record of everything the repository and handler saw
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<(Instant, Event)>>>);

impl Journal {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push((Instant::now(), event));
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn timed(&self) -> Vec<(Instant, Event)> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|(_, e)| predicate(e)).count()
    }
}

pub fn task(id: i64, status: TaskStatus) -> Task {
    Task::new(TaskId::from(id), status)
}

pub fn pending(id: i64) -> Task {
    task(id, TaskStatus::Pending)
}

/// Scripted orchestrator
///
/// Listings are served in order, then empty. Claims succeed unless a
/// status code was configured for the task id.
pub struct MockRepository {
    journal: Journal,
    listings: Mutex<VecDeque<TaskListing>>,
    claim_statuses: HashMap<TaskId, u16>,
    claim_panics: HashSet<TaskId>,
    stop_after_lists: Option<(usize, CancellationToken)>,
}

impl MockRepository {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            listings: Mutex::new(VecDeque::new()),
            claim_statuses: HashMap::new(),
            claim_panics: HashSet::new(),
            stop_after_lists: None,
        }
    }

    pub fn with_listing(self, listing: TaskListing) -> Self {
        self.listings.lock().unwrap().push_back(listing);
        self
    }

    pub fn with_tasks(self, tasks: Vec<Task>) -> Self {
        self.with_listing(TaskListing::Tasks(tasks))
    }

    pub fn with_claim_status(mut self, id: i64, status: u16) -> Self {
        self.claim_statuses.insert(TaskId::from(id), status);
        self
    }

    /// Panics inside the claim call, outside the processor's work guard
    pub fn panicking_claim_on(mut self, id: i64) -> Self {
        self.claim_panics.insert(TaskId::from(id));
        self
    }

    /// Cancels `token` as the `lists`-th listing is served
    pub fn cancel_after_lists(mut self, lists: usize, token: CancellationToken) -> Self {
        self.stop_after_lists = Some((lists, token));
        self
    }
}

#[async_trait]
impl TaskRepository for MockRepository {
    async fn list_pending(&self) -> TaskListing {
        self.journal.push(Event::Listed);

        if let Some((lists, token)) = &self.stop_after_lists {
            if self.journal.count(|e| *e == Event::Listed) >= *lists {
                token.cancel();
            }
        }

        self.listings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| TaskListing::Tasks(Vec::new()))
    }

    async fn claim(&self, task_id: &TaskId) -> ClaimOutcome {
        if self.claim_panics.contains(task_id) {
            panic!("claim of task {} blew up", task_id);
        }
        match self.claim_statuses.get(task_id).copied() {
            None => {
                self.journal.push(Event::Claimed(task_id.clone()));
                ClaimOutcome::Claimed
            }
            Some(status @ (404 | 409)) => ClaimOutcome::Contended { status },
            Some(status) => ClaimOutcome::Failed(ClientError::api_error(status, "scripted")),
        }
    }

    async fn set_status(&self, task_id: &TaskId, status: TaskStatus) {
        self.journal.push(Event::StatusSet(task_id.clone(), status));
    }
}

/// Work handler that records each call and can be told to misbehave
pub struct ScriptedWork {
    journal: Journal,
    duration: Duration,
    failing: HashSet<TaskId>,
    panicking: HashSet<TaskId>,
    cancel_during: Option<(TaskId, CancellationToken)>,
}

impl ScriptedWork {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            duration: Duration::ZERO,
            failing: HashSet::new(),
            panicking: HashSet::new(),
            cancel_during: None,
        }
    }

    pub fn taking(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn failing_on(mut self, id: i64) -> Self {
        self.failing.insert(TaskId::from(id));
        self
    }

    pub fn panicking_on(mut self, id: i64) -> Self {
        self.panicking.insert(TaskId::from(id));
        self
    }

    /// Cancels `token` while working on `id`, before the work finishes
    pub fn cancel_during(mut self, id: i64, token: CancellationToken) -> Self {
        self.cancel_during = Some((TaskId::from(id), token));
        self
    }
}

#[async_trait]
impl WorkHandler for ScriptedWork {
    async fn perform(&self, task: &Task) -> Result<()> {
        self.journal.push(Event::Worked(task.id.clone()));

        if let Some((id, token)) = &self.cancel_during {
            if *id == task.id {
                token.cancel();
            }
        }

        tokio::time::sleep(self.duration).await;

        if self.panicking.contains(&task.id) {
            panic!("work on task {} blew up", task.id);
        }
        if self.failing.contains(&task.id) {
            bail!("work on task {} failed", task.id);
        }
        Ok(())
    }
}
