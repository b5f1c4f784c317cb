//! Task poller
//!
//! Polls the orchestrator for pending tasks and processes them.
//! Tasks are started in the order the orchestrator lists them; at most
//! `max_parallel_tasks` run at once. A cycle ends only after every started
//! task has reported, and the next listing waits a full poll interval.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use relay_core::domain::task::{Task, TaskId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::repository::TaskRepository;
use crate::service::{ProcessOutcome, TaskProcessor, WorkHandler};

/// Summary of one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// Pending tasks returned by the listing (after de-duplication)
    pub listed: usize,
    pub completed: usize,
    pub failed: usize,
    pub not_claimed: usize,
    /// Task ids whose work failed, with the reason
    pub failures: Vec<(TaskId, String)>,
    /// The listing was malformed or the orchestrator unreachable
    pub listing_failed: bool,
    /// Shutdown was requested before every listed task was started
    pub interrupted: bool,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            listed: 0,
            completed: 0,
            failed: 0,
            not_claimed: 0,
            failures: Vec::new(),
            listing_failed: false,
            interrupted: false,
        }
    }

    fn record(&mut self, task_id: TaskId, outcome: ProcessOutcome) {
        match outcome {
            ProcessOutcome::NotClaimed => self.not_claimed += 1,
            ProcessOutcome::Completed => self.completed += 1,
            ProcessOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push((task_id, reason));
            }
        }
    }

    /// Tasks that were claimed and reported this cycle
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// Task poller that continuously polls for and processes tasks
pub struct TaskPoller {
    config: Config,
    repository: Arc<dyn TaskRepository>,
    processor: TaskProcessor,
    semaphore: Arc<Semaphore>,
}

impl TaskPoller {
    /// Creates a new task poller
    pub fn new(
        config: Config,
        repository: Arc<dyn TaskRepository>,
        handler: Arc<dyn WorkHandler>,
    ) -> Self {
        let processor = TaskProcessor::new(Arc::clone(&repository), handler, config.work_timeout);
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_tasks));
        Self {
            config,
            repository,
            processor,
            semaphore,
        }
    }

    /// Runs poll cycles until `shutdown` is cancelled
    ///
    /// Cancellation interrupts the sleep between cycles immediately. During a
    /// cycle it stops new tasks from starting; tasks already claimed finish
    /// and report before this returns.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(
            "Starting task poller (interval: {:?}, max parallel tasks: {})",
            self.config.poll_interval, self.config.max_parallel_tasks
        );

        let mut cycles: u64 = 0;

        while !shutdown.is_cancelled() {
            let report = self.poll_once(&shutdown).await?;
            cycles += 1;

            if report.processed() > 0 || report.interrupted {
                info!(
                    "Cycle {} (started {}): {} listed, {} completed, {} failed, {} not claimed{}",
                    cycles,
                    report.started_at.format("%H:%M:%S"),
                    report.listed,
                    report.completed,
                    report.failed,
                    report.not_claimed,
                    if report.interrupted { ", interrupted by shutdown" } else { "" }
                );
                for (task_id, reason) in &report.failures {
                    debug!("Cycle {}: task {} failed: {}", cycles, task_id, reason);
                }
            } else if report.listing_failed {
                debug!("Cycle {} done: task listing unavailable", cycles);
            } else {
                debug!("Cycle {} done: nothing processed", cycles);
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Task poller stopped after {} cycle(s)", cycles);
        Ok(())
    }

    /// Performs a single poll cycle
    pub async fn poll_once(&self, shutdown: &CancellationToken) -> Result<CycleReport> {
        let mut report = CycleReport::new();

        let listing = self.repository.list_pending().await;
        report.listing_failed = listing.is_failure();

        let mut seen = HashSet::new();
        let tasks: Vec<Task> = listing
            .into_tasks()
            .into_iter()
            .filter(Task::is_pending)
            .filter(|task| {
                let first = seen.insert(task.id.clone());
                if !first {
                    debug!("Task {} listed twice, ignoring duplicate", task.id);
                }
                first
            })
            .collect();
        report.listed = tasks.len();

        if tasks.is_empty() {
            debug!("No pending tasks");
            return Ok(report);
        }

        if shutdown.is_cancelled() {
            report.interrupted = true;
            return Ok(report);
        }

        info!("Found {} pending task(s)", tasks.len());

        let mut running = JoinSet::new();
        let mut spawned: HashMap<Id, TaskId> = HashMap::new();

        for task in tasks {
            // Permits are handed out in request order, so tasks start in listing order
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    report.interrupted = true;
                    break;
                }
                permit = Arc::clone(&self.semaphore).acquire_owned() => {
                    permit.context("Task semaphore closed")?
                }
            };

            let processor = self.processor.clone();
            let task_id = task.id.clone();
            let handle = running.spawn(async move {
                let outcome = processor.process(task).await;
                drop(permit);
                outcome
            });
            spawned.insert(handle.id(), task_id);
        }

        while let Some(joined) = running.join_next_with_id().await {
            match joined {
                Ok((handle_id, outcome)) => {
                    if let Some(task_id) = spawned.remove(&handle_id) {
                        report.record(task_id, outcome);
                    }
                }
                Err(e) => {
                    let reason = format!("processing aborted: {}", e);
                    match spawned.remove(&e.id()) {
                        Some(task_id) => {
                            warn!("Task {} {}", task_id, reason);
                            report.record(task_id, ProcessOutcome::Failed(reason));
                        }
                        None => warn!("Unknown task {}", reason),
                    }
                }
            }
        }

        Ok(report)
    }
}
