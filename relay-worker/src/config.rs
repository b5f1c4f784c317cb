//! Worker configuration
//!
//! Defines all configurable parameters for the worker including the
//! orchestrator connection, tenant, polling cadence and request policy.
//! Built once at startup and handed to each component.

use anyhow::Context;
use relay_client::RetryPolicy;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Worker configuration
///
/// All timeouts and intervals are configurable to allow tuning
/// for different deployment scenarios (dev vs prod, fast vs slow networks).
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifier for this worker instance, used in logs
    pub worker_id: String,

    /// Tenant sent as `X-Tenant-ID` on every request
    pub tenant_id: String,

    /// Orchestrator base URL (e.g., "http://localhost:4000")
    pub orchestrator_url: String,

    /// Pause between the end of one poll cycle and the next listing
    pub poll_interval: Duration,

    /// How long the simulated work takes per task
    pub work_duration: Duration,

    /// Maximum time the work for one task may run before it is failed
    pub work_timeout: Duration,

    /// Upper bound for each HTTP attempt
    pub request_timeout: Duration,

    /// Attempts per request, including the first
    pub request_max_attempts: u32,

    /// First backoff delay after a transient failure
    pub retry_initial_delay: Duration,

    /// Backoff cap
    pub retry_max_delay: Duration,

    /// Tasks processed concurrently within one cycle
    pub max_parallel_tasks: usize,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(tenant_id: String, orchestrator_url: String) -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            tenant_id,
            orchestrator_url,
            poll_interval: Duration::from_millis(2000),
            work_duration: Duration::from_millis(2000),
            work_timeout: Duration::from_secs(300), // 5 minutes
            request_timeout: Duration::from_secs(10),
            request_max_attempts: 3,
            retry_initial_delay: Duration::from_millis(200),
            retry_max_delay: Duration::from_secs(5),
            max_parallel_tasks: 1,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - ORCH_URL (default: http://localhost:4000)
    /// - TENANT_ID (default: default-tenant)
    /// - WORKER_ID (default: random UUID)
    /// - POLL_INTERVAL_MS (default: 2000)
    /// - WORK_DURATION_MS (default: 2000)
    /// - WORK_TIMEOUT_MS (default: 300000)
    /// - REQUEST_TIMEOUT_MS (default: 10000)
    /// - REQUEST_MAX_ATTEMPTS (default: 3)
    /// - RETRY_DELAY_MS (default: 200)
    /// - RETRY_MAX_DELAY_MS (default: 5000)
    /// - MAX_PARALLEL_TASKS (default: 1)
    ///
    /// A variable that is set but does not parse is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(
            get("TENANT_ID").unwrap_or_else(|| "default-tenant".to_string()),
            get("ORCH_URL").unwrap_or_else(|| "http://localhost:4000".to_string()),
        );

        if let Some(worker_id) = get("WORKER_ID") {
            config.worker_id = worker_id;
        }

        let millis = |name: &str, default: Duration| -> anyhow::Result<Duration> {
            Ok(parse_var::<u64>(get(name), name)?
                .map(Duration::from_millis)
                .unwrap_or(default))
        };

        config.poll_interval = millis("POLL_INTERVAL_MS", config.poll_interval)?;
        config.work_duration = millis("WORK_DURATION_MS", config.work_duration)?;
        config.work_timeout = millis("WORK_TIMEOUT_MS", config.work_timeout)?;
        config.request_timeout = millis("REQUEST_TIMEOUT_MS", config.request_timeout)?;
        config.retry_initial_delay = millis("RETRY_DELAY_MS", config.retry_initial_delay)?;
        config.retry_max_delay = millis("RETRY_MAX_DELAY_MS", config.retry_max_delay)?;

        if let Some(attempts) = parse_var(get("REQUEST_MAX_ATTEMPTS"), "REQUEST_MAX_ATTEMPTS")? {
            config.request_max_attempts = attempts;
        }

        if let Some(parallel) = parse_var(get("MAX_PARALLEL_TASKS"), "MAX_PARALLEL_TASKS")? {
            config.max_parallel_tasks = parallel;
        }

        Ok(config)
    }

    /// Retry policy for the orchestrator client
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.request_max_attempts,
            self.retry_initial_delay,
            self.retry_max_delay,
        )
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tenant_id.trim().is_empty() {
            anyhow::bail!("tenant_id cannot be empty");
        }

        if self.orchestrator_url.is_empty() {
            anyhow::bail!("orchestrator_url cannot be empty");
        }

        if !self.orchestrator_url.starts_with("http://")
            && !self.orchestrator_url.starts_with("https://")
        {
            anyhow::bail!("orchestrator_url must start with http:// or https://");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.work_timeout.is_zero() {
            anyhow::bail!("work_timeout must be greater than 0");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.request_max_attempts == 0 {
            anyhow::bail!("request_max_attempts must be greater than 0");
        }

        if self.max_parallel_tasks == 0 {
            anyhow::bail!("max_parallel_tasks must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            "default-tenant".to_string(),
            "http://localhost:4000".to_string(),
        )
    }
}

fn parse_var<T>(value: Option<String>, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display + Send + Sync + 'static,
{
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("Invalid value for {}: '{}'", name, raw))
        })
        .transpose()
}
