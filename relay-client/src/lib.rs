//! Relay HTTP Client
//!
//! A small, typed HTTP client for the task orchestrator API used by the
//! Relay worker.
//!
//! Every request carries the tenant header and a JSON content type, is
//! bounded by a timeout, and is retried with exponential backoff when the
//! failure looks transient (connect error, timeout, 5xx).
//!
//! # Example
//!
//! ```no_run
//! use relay_client::{OrchestratorClient, TenantContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), relay_client::ClientError> {
//!     let tenant = TenantContext::new("default-tenant")?;
//!     let client = OrchestratorClient::new("http://localhost:4000", tenant);
//!
//!     for task in client.list_pending().await.into_tasks() {
//!         if client.claim(&task.id).await {
//!             println!("Claimed task {}", task.id);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod retry;
pub mod tenant;
mod tasks;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use retry::RetryPolicy;
pub use tasks::{ClaimOutcome, TaskListing};
pub use tenant::{TENANT_HEADER, TenantContext};

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

use crate::error::is_transient_transport;

/// Default upper bound for a single HTTP exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the orchestrator task API
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:4000")
    base_url: String,
    /// HTTP client instance
    client: Client,
    tenant: TenantContext,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API (e.g., "http://localhost:4000")
    /// * `tenant` - Tenant sent as `X-Tenant-ID` on every request
    ///
    /// # Example
    /// ```
    /// use relay_client::{OrchestratorClient, TenantContext};
    ///
    /// let tenant = TenantContext::new("acme").unwrap();
    /// let client = OrchestratorClient::new("http://localhost:4000", tenant);
    /// ```
    pub fn new(base_url: impl Into<String>, tenant: TenantContext) -> Self {
        Self::with_client(base_url, tenant, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure proxies, TLS settings, connection pools, etc.
    /// The per-request timeout set with [`with_timeout`](Self::with_timeout)
    /// still applies on top of anything configured here.
    pub fn with_client(base_url: impl Into<String>, tenant: TenantContext, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            tenant,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the upper bound for each individual HTTP attempt
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how transient failures are retried
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // =============================================================================
    // Request Plumbing
    // =============================================================================

    /// Builds an endpoint URL below the base URL
    ///
    /// Segments are percent-encoded, so opaque task ids containing `/` or
    /// spaces stay a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ClientError::InvalidRequest(format!(
                "Invalid orchestrator URL '{}': {}",
                self.base_url, e
            ))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                ClientError::InvalidRequest(format!(
                    "Orchestrator URL '{}' cannot be a base",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// Starts a request with the tenant header, content type and timeout applied
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(TENANT_HEADER, self.tenant.header_value().clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
    }

    /// Sends a request, retrying transient failures per the retry policy
    ///
    /// `build` is called once per attempt. A 5xx response that survives the
    /// last attempt is returned as-is for the response handlers to reject.
    async fn send<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;

        loop {
            let result = build().send().await;

            let retryable = match &result {
                Ok(response) => response.status().is_server_error(),
                Err(e) => is_transient_transport(e),
            };

            if !retryable || attempt >= self.retry.max_attempts {
                return result.map_err(ClientError::from);
            }

            let delay = self.retry.delay_for(attempt);
            match &result {
                Ok(response) => warn!(
                    "Orchestrator returned {} (attempt {}/{}), retrying in {:?}",
                    response.status(),
                    attempt,
                    self.retry.max_attempts,
                    delay
                ),
                Err(e) => warn!(
                    "Request to orchestrator failed (attempt {}/{}): {}, retrying in {:?}",
                    attempt, self.retry.max_attempts, e, delay
                ),
            }

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Transport failures while reading the body stay `RequestFailed`; only a
    /// body that arrived but does not decode becomes `ParseError`.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is ignored
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantContext {
        TenantContext::new("acme").unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = OrchestratorClient::new("http://localhost:4000", tenant());
        assert_eq!(client.base_url(), "http://localhost:4000");
        assert_eq!(client.tenant().id(), "acme");
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(client.retry_policy(), &RetryPolicy::default());
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:4000/", tenant());
        assert_eq!(client.base_url(), "http://localhost:4000");
    }

    #[test]
    fn test_client_with_custom_client() {
        let client = OrchestratorClient::with_client("http://localhost:4000", tenant(), Client::new())
            .with_timeout(Duration::from_millis(250))
            .with_retry_policy(RetryPolicy::none());
        assert_eq!(client.timeout(), Duration::from_millis(250));
        assert_eq!(client.retry_policy().max_attempts, 1);
    }

    #[test]
    fn test_endpoint_encodes_opaque_ids() {
        let client = OrchestratorClient::new("http://localhost:4000/api/", tenant());
        let url = client.endpoint(&["tasks", "a/b c", "claim"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4000/api/tasks/a%2Fb%20c/claim");
    }

    #[test]
    fn test_endpoint_rejects_invalid_base() {
        let client = OrchestratorClient::new("not a url", tenant());
        let err = client.endpoint(&["tasks"]).unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }
}
