use crate::provider::errors::RouterError;
use reqwest::{Client, ClientBuilder};
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;

/// Configuration for HTTP transport concurrency and timeout behavior.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of concurrent HTTP requests allowed across adapters.
    pub concurrent_limit: usize,
    /// Permit acquisition timeout in milliseconds.
    pub permit_timeout_ms: u64,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self { concurrent_limit: 512, permit_timeout_ms: 500, connect_timeout_secs: 5 }
    }
}

/// Shared HTTP transport with semaphore-based concurrency control.
///
/// One instance is shared by every [`HttpProviderAdapter`] so the process has
/// a single connection pool and a global cap on in-flight upstream requests.
///
/// # HTTP status mapping
///
/// - 2xx: body returned to the caller
/// - 429: [`RouterError::Provider`] with the rate-limit code, so failover
///   moves on without penalizing the provider
/// - any other non-success: [`RouterError::Connection`], which penalizes the
///   provider and advances its circuit breaker
///
/// [`HttpProviderAdapter`]: crate::provider::http_adapter::HttpProviderAdapter
pub struct HttpClient {
    client: Client,
    permits: Arc<Semaphore>,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Creates a transport with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, RouterError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Creates a transport with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, RouterError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("manifold/", env!("CARGO_PKG_VERSION")))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                RouterError::Connection(format!("http client build failed: {e}"))
            })?;

        Ok(Self { client, permits: Arc::new(Semaphore::new(config.concurrent_limit)), config })
    }

    /// Sanitizes network errors so upstream URLs and internals never leak
    /// into caller-visible messages.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_body() || error.is_decode() {
            "response body error".to_string()
        } else if error.is_redirect() {
            "too many redirects".to_string()
        } else {
            "network error".to_string()
        }
    }

    /// Sends an HTTP POST with a JSON body and the given timeout.
    ///
    /// # Errors
    ///
    /// - [`RouterError::Timeout`] if permit acquisition or the request times out
    /// - [`RouterError::Connection`] for network failures and non-429 error statuses
    /// - [`RouterError::Provider`] for HTTP 429
    pub async fn post_json(
        &self,
        url: &str,
        body: bytes::Bytes,
        timeout: Duration,
    ) -> Result<bytes::Bytes, RouterError> {
        let permit_timeout = Duration::from_millis(self.config.permit_timeout_ms);
        let permit =
            tokio::time::timeout(permit_timeout, Arc::clone(&self.permits).acquire_owned())
                .await
                .map_err(|_| {
                    tracing::warn!(
                        available_permits = self.permits.available_permits(),
                        "http transport permit acquisition timed out"
                    );
                    RouterError::Timeout
                })?
                .map_err(|_| RouterError::Connection("http transport closed".to_string()))?;
        let _permit = permit;

        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(url)
                .header("content-type", "application/json")
                .body(body)
                .send(),
        )
        .await
        .map_err(|_| RouterError::Timeout)?
        .map_err(|e| {
            if e.is_timeout() {
                RouterError::Timeout
            } else {
                RouterError::Connection(Self::sanitize_network_error(&e))
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(RouterError::Provider {
                code: -32005,
                message: "rate limited (HTTP 429)".to_string(),
            });
        }
        if !status.is_success() {
            return Err(RouterError::Connection(format!("HTTP {status}")));
        }

        tokio::time::timeout(timeout, response.bytes())
            .await
            .map_err(|_| RouterError::Timeout)?
            .map_err(|e| RouterError::Connection(Self::sanitize_network_error(&e)))
    }
}
