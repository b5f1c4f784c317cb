//! Relay Worker
//!
//! A tenant-scoped worker that claims and processes tasks handed out by a
//! remote orchestrator.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: Orchestrator access behind a trait
//! - Services: Claim, run work, report status for one task
//! - Scheduler: Poll cycle and shutdown handling
//!
//! The worker lists pending tasks, claims them one by one, runs the work
//! and reports `completed` or `failed`, then sleeps and polls again until
//! it receives SIGINT or SIGTERM.

mod config;
mod repository;
mod scheduler;
mod service;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repository::TaskRepository;
use crate::scheduler::TaskPoller;
use crate::service::{SimulatedWork, WorkHandler};
use relay_client::{OrchestratorClient, TenantContext};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_worker=info,relay_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Relay worker starting");

    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        return Err(e);
    }

    info!("Relay worker stopped");
    Ok(())
}

async fn run() -> Result<()> {
    let config = load_config()?;
    info!(
        "Connecting to orchestrator at {} (tenant: {}, worker: {})",
        config.orchestrator_url, config.tenant_id, config.worker_id
    );

    let tenant = TenantContext::new(config.tenant_id.clone()).context("Invalid tenant id")?;
    let client = OrchestratorClient::new(config.orchestrator_url.clone(), tenant)
        .with_timeout(config.request_timeout)
        .with_retry_policy(config.retry_policy());

    let repository: Arc<dyn TaskRepository> = Arc::new(client);
    let handler: Arc<dyn WorkHandler> = Arc::new(SimulatedWork::new(config.work_duration));

    info!(
        "Poll interval: {:?}, work duration: {:?}, request timeout: {:?}",
        config.poll_interval, config.work_duration, config.request_timeout
    );

    let poller = TaskPoller::new(config, repository, handler);

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    poller.run(shutdown).await
}

/// Loads and validates configuration from environment variables
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Cancels `shutdown` on the first SIGINT or SIGTERM
fn spawn_shutdown_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested, letting in-flight tasks finish");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => return,
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                },
                _ = terminate.recv() => return,
            }
            terminate.recv().await;
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
