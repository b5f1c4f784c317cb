//! Work handlers
//!
//! The work performed for a claimed task. The worker ships a simulated
//! handler; real deployments plug in their own.

use anyhow::Result;
use async_trait::async_trait;
use relay_core::domain::task::Task;
use std::time::Duration;
use tracing::info;

/// Service trait for the work done on a claimed task
#[async_trait]
pub trait WorkHandler: Send + Sync {
    /// Performs the work for one task
    ///
    /// # Returns
    /// `Ok(())` to report the task `completed`, an error to report it `failed`
    async fn perform(&self, task: &Task) -> Result<()>;
}

/// Stands in for real work by waiting a fixed duration
pub struct SimulatedWork {
    duration: Duration,
}

impl SimulatedWork {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl WorkHandler for SimulatedWork {
    async fn perform(&self, task: &Task) -> Result<()> {
        info!("Processing task {}...", task.id);
        tokio::time::sleep(self.duration).await;
        info!("Finished work on task {}", task.id);
        Ok(())
    }
}
