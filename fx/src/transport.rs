//! Outbound HTTP with retries, circuit breaking, and correlation headers.

use async_trait::async_trait;
use ratebridge_common::{CorrelationId, CORRELATION_ID_HEADER};
use reqwest::Method;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::context::RequestContext;
use crate::error::{FxError, FxResult};
use crate::metrics::ProviderMetrics;
use crate::retry::{is_transient_status, RetryPolicy};

/// Longest body excerpt copied into error messages.
const BODY_EXCERPT_LEN: usize = 200;

/// One outbound request.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    /// Sent as the `X-Correlation-ID` header.
    pub correlation_id: CorrelationId,
}

/// Status and body of an upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn excerpt(&self) -> &str {
        match self.body.char_indices().nth(BODY_EXCERPT_LEN) {
            Some((idx, _)) => &self.body[..idx],
            None => &self.body,
        }
    }
}

/// Failure to get any response at all.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for SendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SendError::Timeout(err.to_string())
        } else {
            SendError::Network(err.to_string())
        }
    }
}

/// Raw HTTP client seam.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, SendError>;
}

/// [`HttpClient`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Build a client with a per-request timeout.
    pub fn new(timeout: Duration) -> FxResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ratebridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FxError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, SendError> {
        let response = self
            .client
            .request(request.method.clone(), &request.url)
            .header(CORRELATION_ID_HEADER, request.correlation_id.to_string())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(UpstreamResponse { status, body })
    }
}

/// Why an attempt is eligible for retry.
enum TransientFailure {
    Status(UpstreamResponse),
    Send(SendError),
}

impl TransientFailure {
    fn into_error(self, provider: &str) -> FxError {
        match self {
            TransientFailure::Status(response) => FxError::Upstream {
                provider: provider.to_string(),
                status: Some(response.status),
                message: format!("HTTP {}: {}", response.status, response.excerpt()),
            },
            TransientFailure::Send(err) => FxError::Upstream {
                provider: provider.to_string(),
                status: None,
                message: err.to_string(),
            },
        }
    }
}

impl fmt::Display for TransientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientFailure::Status(response) => write!(f, "HTTP {}", response.status),
            TransientFailure::Send(err) => write!(f, "{err}"),
        }
    }
}

/// Resilient transport for one provider.
///
/// Each logical call acquires a circuit permit, then retries transient
/// failures on the [`RetryPolicy`] schedule. The breaker sees one outcome
/// per logical call, not per HTTP attempt: with the default schedule a
/// tripped circuit follows 5 calls of 7 attempts each, 35 upstream requests.
/// A half-open probe gets a single attempt. Every attempt carries the
/// caller's correlation ID.
pub struct ResilientHttpTransport {
    provider: String,
    client: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    metrics: Arc<ProviderMetrics>,
}

impl ResilientHttpTransport {
    pub fn new(
        provider: impl Into<String>,
        client: Arc<dyn HttpClient>,
        retry: RetryPolicy,
        breaker: CircuitBreakerConfig,
        metrics: Arc<ProviderMetrics>,
    ) -> Self {
        let provider = provider.into();
        Self {
            breaker: CircuitBreaker::new(provider.clone(), breaker),
            provider,
            client,
            retry,
            metrics,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn circuit(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn metrics(&self) -> &Arc<ProviderMetrics> {
        &self.metrics
    }

    /// GET a URL.
    pub async fn get(&self, url: &str, ctx: &RequestContext) -> FxResult<UpstreamResponse> {
        self.execute(Method::GET, url, ctx).await
    }

    /// Run one logical call. Returns only 2xx responses.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        ctx: &RequestContext,
    ) -> FxResult<UpstreamResponse> {
        let correlation_id = ctx.correlation_id();

        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(open) => {
                self.metrics.circuit_rejected();
                warn!(
                    provider = %self.provider,
                    %correlation_id,
                    url,
                    retry_after_secs = open.retry_after.map(|d| d.as_secs()),
                    "Circuit open, failing fast"
                );
                return Err(FxError::CircuitOpen {
                    provider: self.provider.clone(),
                    retry_after: open.retry_after,
                });
            }
        };

        let max_attempts = if permit.is_probe() {
            1
        } else {
            self.retry.max_attempts()
        };
        let request = UpstreamRequest {
            method,
            url: url.to_string(),
            correlation_id,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.metrics.attempt();
            debug!(provider = %self.provider, %correlation_id, url, attempt, "Sending upstream request");

            let outcome = tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => return Err(self.cancelled(url, ctx)),
                outcome = self.client.send(&request) => outcome,
            };

            let failure = match outcome {
                Ok(response) if response.is_success() => {
                    permit.succeed();
                    return Ok(response);
                }
                Ok(response) if !is_transient_status(response.status) => {
                    // Upstream is answering; the request itself is bad.
                    permit.succeed();
                    self.metrics.failure();
                    error!(
                        provider = %self.provider,
                        %correlation_id,
                        url,
                        status = response.status,
                        "Upstream rejected request"
                    );
                    return Err(FxError::Upstream {
                        provider: self.provider.clone(),
                        status: Some(response.status),
                        message: format!("HTTP {}: {}", response.status, response.excerpt()),
                    });
                }
                Ok(response) => TransientFailure::Status(response),
                Err(err) => TransientFailure::Send(err),
            };

            if attempt >= max_attempts {
                permit.fail();
                self.metrics.failure();
                error!(
                    provider = %self.provider,
                    %correlation_id,
                    url,
                    attempts = attempt,
                    error = %failure,
                    "Upstream call failed"
                );
                return Err(failure.into_error(&self.provider));
            }

            if self.breaker.state() == CircuitState::Open {
                self.metrics.circuit_rejected();
                warn!(
                    provider = %self.provider,
                    %correlation_id,
                    url,
                    attempts = attempt,
                    "Circuit opened by concurrent calls, abandoning retries"
                );
                return Err(FxError::CircuitOpen {
                    provider: self.provider.clone(),
                    retry_after: Some(self.breaker.config().cooldown),
                });
            }

            let delay = self.retry.delay_for(attempt);
            self.metrics.retry();
            warn!(
                provider = %self.provider,
                %correlation_id,
                url,
                attempt,
                delay_secs = delay.as_secs(),
                error = %failure,
                "Transient upstream failure, retrying"
            );

            tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => return Err(self.cancelled(url, ctx)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn cancelled(&self, url: &str, ctx: &RequestContext) -> FxError {
        info!(
            provider = %self.provider,
            correlation_id = %ctx.correlation_id(),
            url,
            "Upstream call cancelled"
        );
        FxError::Cancelled
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::ScriptedHttpClient;

#[cfg(any(test, feature = "test-utils"))]
mod scripted {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Test client that replays queued outcomes and records every request.
    ///
    /// Once the queue is empty it keeps returning the fallback outcome.
    pub struct ScriptedHttpClient {
        script: Mutex<VecDeque<Result<UpstreamResponse, SendError>>>,
        fallback: Result<UpstreamResponse, SendError>,
        requests: Mutex<Vec<UpstreamRequest>>,
    }

    impl ScriptedHttpClient {
        pub fn new(fallback: Result<UpstreamResponse, SendError>) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Client that always answers 200 with `body`.
        pub fn ok(body: &str) -> Self {
            Self::new(Ok(UpstreamResponse {
                status: 200,
                body: body.to_string(),
            }))
        }

        /// Client that always answers with `status`.
        pub fn status(status: u16) -> Self {
            Self::new(Ok(UpstreamResponse {
                status,
                body: String::new(),
            }))
        }

        /// Queue `count` responses with `status` ahead of the fallback.
        pub fn then_status(self, status: u16, count: usize) -> Self {
            {
                let mut script = self.script.lock();
                for _ in 0..count {
                    script.push_back(Ok(UpstreamResponse {
                        status,
                        body: String::new(),
                    }));
                }
            }
            self
        }

        /// Queue one outcome ahead of the fallback.
        pub fn then(self, outcome: Result<UpstreamResponse, SendError>) -> Self {
            self.script.lock().push_back(outcome);
            self
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().len()
        }

        pub fn requests(&self) -> Vec<UpstreamRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttpClient {
        async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, SendError> {
            self.requests.lock().push(request.clone());
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn transport(client: Arc<ScriptedHttpClient>, retry: RetryPolicy) -> ResilientHttpTransport {
        ResilientHttpTransport::new(
            "frankfurter",
            client,
            retry,
            CircuitBreakerConfig::default(),
            Arc::new(ProviderMetrics::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_five_transient_failures() {
        let client = Arc::new(ScriptedHttpClient::ok("{}").then_status(503, 5));
        let transport = transport(client.clone(), RetryPolicy::default());
        let ctx = RequestContext::new();

        let started = tokio::time::Instant::now();
        let response = transport.get("http://rates/latest", &ctx).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(client.calls(), 6);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(2 + 4 + 8 + 16 + 32));
        assert!(waited < Duration::from_secs(63));
        assert_eq!(transport.circuit().consecutive_failures(), 0);

        let snapshot = transport.metrics().snapshot();
        assert_eq!(snapshot.upstream_attempts, 6);
        assert_eq!(snapshot.upstream_retries, 5);
        assert_eq!(snapshot.upstream_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retry_budget() {
        let client = Arc::new(ScriptedHttpClient::status(500));
        let transport = transport(client.clone(), RetryPolicy::default());

        let err = transport
            .get("http://rates/latest", &RequestContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FxError::Upstream { status: Some(500), .. }));
        assert_eq!(client.calls(), 7);
        assert_eq!(transport.circuit().consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_errors_are_retried() {
        let client = Arc::new(
            ScriptedHttpClient::ok("{}")
                .then(Err(SendError::Network("connection reset".into())))
                .then(Err(SendError::Timeout("deadline".into()))),
        );
        let transport = transport(client.clone(), RetryPolicy::default());

        assert_ok!(transport.get("http://rates/latest", &RequestContext::new()).await);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let client = Arc::new(ScriptedHttpClient::status(422));
        let transport = transport(client.clone(), RetryPolicy::default());

        let err = transport
            .get("http://rates/latest", &RequestContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FxError::Upstream { status: Some(422), .. }));
        assert_eq!(client.calls(), 1);
        assert_eq!(transport.circuit().consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_correlation_id_stable_across_retries() {
        let client = Arc::new(ScriptedHttpClient::ok("{}").then_status(502, 3));
        let transport = transport(client.clone(), RetryPolicy::default());
        let ctx = RequestContext::new();

        assert_ok!(transport.get("http://rates/latest", &ctx).await);

        let requests = client.requests();
        assert_eq!(requests.len(), 4);
        assert!(requests
            .iter()
            .all(|r| r.correlation_id == ctx.correlation_id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast_then_probes() {
        let client = Arc::new(ScriptedHttpClient::status(503));
        let transport = transport(client.clone(), RetryPolicy::none());
        let ctx = RequestContext::new();

        for _ in 0..5 {
            assert_err!(transport.get("http://rates/latest", &ctx).await);
        }
        assert_eq!(transport.circuit().state(), CircuitState::Open);
        assert_eq!(client.calls(), 5);

        let err = transport.get("http://rates/latest", &ctx).await.unwrap_err();
        assert!(matches!(err, FxError::CircuitOpen { .. }));
        assert_eq!(client.calls(), 5);

        tokio::time::advance(Duration::from_secs(30)).await;
        transport.get("http://rates/latest", &ctx).await.unwrap_err();
        assert_eq!(client.calls(), 6);
        assert_eq!(transport.circuit().state(), CircuitState::Open);
        assert_eq!(transport.metrics().snapshot().circuit_rejections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_probe_closes_circuit() {
        let client = Arc::new(ScriptedHttpClient::ok("{}").then_status(503, 5 * 7));
        let transport = transport(client.clone(), RetryPolicy::default());
        let ctx = RequestContext::new();

        for _ in 0..5 {
            transport.get("http://rates/latest", &ctx).await.unwrap_err();
        }
        assert_eq!(transport.circuit().state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;
        transport.get("http://rates/latest", &ctx).await.unwrap();
        assert_eq!(transport.circuit().state(), CircuitState::Closed);
        assert_eq!(client.calls(), 5 * 7 + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let client = Arc::new(ScriptedHttpClient::status(503));
        let transport = transport(client.clone(), RetryPolicy::default());
        let ctx = RequestContext::new();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            canceller.cancel();
        });

        let err = transport.get("http://rates/latest", &ctx).await.unwrap_err();
        assert!(matches!(err, FxError::Cancelled));
        // Attempt at t=0, retry at t=2, cancelled during the 4s wait.
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        let response = UpstreamResponse {
            status: 500,
            body: "x".repeat(1000),
        };
        assert_eq!(response.excerpt().len(), BODY_EXCERPT_LEN);
    }
}
