//! Client and dispatch loop.
//!
//! # Data Flow
//! ```text
//! execute(request)
//!     → balancer.select() (unless the target URL is absolute)
//!     → prepare attempt (resolve URL, merge default headers, body snapshot)
//!     → transport round-trip, raced against the per-call deadline
//!     → On failure: balancer.record_failure(), retry policy consulted,
//!       balancer.advance(), jittered backoff raced against the deadline
//!     → Response returned to the caller, or a terminal error
//! ```
//!
//! # Design Decisions
//! - One dispatch loop runs per logical call; many calls share one `Client`
//!   and only the balancer state is shared (behind its own lock)
//! - The caller's original `Request` is never mutated across attempts; each
//!   attempt builds a fresh transport request over the body snapshot
//! - Dropping the returned future cancels the in-flight attempt and any
//!   backoff wait

pub mod json;
pub mod request;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Method;
use tokio::time::{sleep, sleep_until, timeout_at, Instant};
use url::Url;

use crate::balancer::{host_key, Balancer, Endpoint};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::resilience::backoff::backoff_with_jitter;
use crate::resilience::policy::{AttemptOutcome, RetryPolicy, TransportErrorKind};

pub use request::{Body, Request};

const DEFAULT_USER_AGENT: &str = concat!("replica-client/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    endpoints: Vec<Endpoint>,
    transport: Option<reqwest::Client>,
    policy: RetryPolicy,
    preferred_dc: Option<String>,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            transport: None,
            policy: RetryPolicy::default(),
            preferred_dc: None,
            headers: Vec::new(),
            timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Use a caller-supplied transport instead of the tuned default.
    pub fn transport(mut self, transport: reqwest::Client) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the default retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Prefer endpoints tagged with this data center label.
    pub fn preferred_dc(mut self, dc: &str) -> Self {
        self.preferred_dc = Some(dc.to_string());
        self
    }

    /// Add a default header applied to every request unless the request
    /// already sets it.
    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Default per-call deadline covering all attempts and backoff waits.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Remove the default per-call deadline.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn build(self) -> Result<Client> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .map_err(ClientError::Transport)?,
        };

        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::Config(format!("invalid header name {name:?}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::Config(format!("invalid header value for {name}")))?;
            default_headers.insert(name, value);
        }
        if !default_headers.contains_key(USER_AGENT) {
            default_headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        }
        if !default_headers.contains_key(ACCEPT) {
            default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }

        let balancer = Balancer::new(&self.endpoints);
        Ok(Client {
            inner: Arc::new(ClientShared {
                transport,
                balancer,
                policy: self.policy,
                preferred_dc: self.preferred_dc,
                default_headers,
                default_timeout: self.timeout,
            }),
        })
    }
}

#[derive(Debug)]
struct ClientShared {
    transport: reqwest::Client,
    balancer: Balancer,
    policy: RetryPolicy,
    preferred_dc: Option<String>,
    default_headers: HeaderMap,
    default_timeout: Option<Duration>,
}

/// HTTP client with retry and health-aware client-side balancing.
///
/// Cheap to clone; clones share the transport pool and balancer state.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientShared>,
}

impl Client {
    /// Client over `endpoints` with default transport, policy and headers.
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self> {
        Self::builder(endpoints).build()
    }

    pub fn builder(endpoints: Vec<Endpoint>) -> ClientBuilder {
        ClientBuilder::new(endpoints)
    }

    /// Build a client from the serde config schema.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut endpoints = Vec::with_capacity(config.endpoints.len());
        for entry in &config.endpoints {
            let mut endpoint = Endpoint::new(&entry.base_url)?;
            endpoint.dc = entry.dc.clone();
            endpoints.push(endpoint);
        }

        let transport = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .pool_idle_timeout(Duration::from_secs(config.timeouts.pool_idle_secs))
            .build()
            .map_err(ClientError::Transport)?;

        let mut builder = Self::builder(endpoints)
            .transport(transport)
            .retry_policy(config.retry.to_policy()?)
            .timeout(Duration::from_secs(config.timeouts.request_secs));
        if let Some(dc) = &config.preferred_dc {
            builder = builder.preferred_dc(dc);
        }
        for (name, value) in &config.headers {
            builder = builder.default_header(name, value);
        }
        builder.build()
    }

    /// Convenience constructor for a [`Request`] aimed at this client.
    pub fn request(&self, method: Method, target: &str) -> Request {
        Request::new(method, target)
    }

    /// Dispatch a request, retrying per policy across balanced endpoints.
    ///
    /// On success the response is returned with its body unconsumed; a final
    /// non-2xx response that was never eligible for retry is returned as a
    /// response too, not an error. Responses from discarded attempts are
    /// dropped before the next attempt starts.
    pub async fn execute(&self, request: Request) -> Result<reqwest::Response> {
        let deadline = request
            .timeout
            .or(self.inner.default_timeout)
            .map(|timeout| Instant::now() + timeout);

        // Materialize the body once so every attempt replays identical bytes.
        let mut request = request;
        let body_snapshot: Option<Bytes> = match request.body.as_mut() {
            Some(body) => Some(body.snapshot().await.map_err(ClientError::BodyRead)?),
            None => None,
        };

        let mut headers = request.headers.clone();
        request::merge_default_headers(&mut headers, &self.inner.default_headers);

        let preferred_dc = self.inner.preferred_dc.as_deref();
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let (url, host) = self.prepare_url(&request)?;

            let mut attempt = self
                .inner
                .transport
                .request(request.method.clone(), url)
                .headers(headers.clone());
            if let Some(body) = &body_snapshot {
                attempt = attempt.body(body.clone());
            }

            let outcome = match deadline {
                Some(deadline) => match timeout_at(deadline, attempt.send()).await {
                    Ok(result) => result,
                    Err(_) => {
                        self.inner
                            .balancer
                            .record_failure(&host, std::time::Instant::now());
                        return Err(ClientError::DeadlineExceeded);
                    }
                },
                None => attempt.send().await,
            };

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if !self.inner.policy.status_is_retryable(status, &request.method) {
                        return Ok(response);
                    }

                    // Retryable status: this attempt failed. Dropping the
                    // response returns the connection to the pool.
                    self.inner
                        .balancer
                        .record_failure(&host, std::time::Instant::now());
                    tracing::warn!(
                        host = %host,
                        status = status.as_u16(),
                        attempt = attempts,
                        "attempt returned retryable status"
                    );
                    drop(response);

                    let outcome = AttemptOutcome::Status(status);
                    if !self.inner.policy.should_retry(&request.method, &outcome, attempts) {
                        return Err(ClientError::ExhaustedStatus { status, attempts });
                    }
                }
                Err(err) => {
                    let kind = TransportErrorKind::classify(&err);
                    self.inner
                        .balancer
                        .record_failure(&host, std::time::Instant::now());
                    tracing::warn!(
                        host = %host,
                        attempt = attempts,
                        error = %err,
                        "attempt failed"
                    );

                    let outcome = AttemptOutcome::Transport(kind);
                    if !self.inner.policy.should_retry(&request.method, &outcome, attempts) {
                        return Err(match kind {
                            TransportErrorKind::TimedOut => ClientError::DeadlineExceeded,
                            _ => ClientError::Transport(err),
                        });
                    }
                }
            }

            // Bias the next selection away from the endpoint that just
            // failed, then wait out the backoff, racing the deadline.
            self.inner.balancer.advance(preferred_dc);

            let wait = backoff_with_jitter(
                attempts - 1,
                self.inner.policy.initial_backoff,
                self.inner.policy.max_backoff,
                self.inner.policy.jitter_fraction,
            );
            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                attempt = attempts,
                "backing off before retry"
            );
            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = sleep(wait) => {}
                        _ = sleep_until(deadline) => return Err(ClientError::DeadlineExceeded),
                    }
                }
                None => sleep(wait).await,
            }
        }
    }

    /// Resolve where this attempt goes: the pinned absolute URL, or a fresh
    /// balancer selection for a relative path.
    fn prepare_url(&self, request: &Request) -> Result<(Url, String)> {
        match &request.target {
            request::Target::Absolute(url) => Ok((url.clone(), host_key(url))),
            request::Target::Relative(path) => {
                let selection = self
                    .inner
                    .balancer
                    .select(self.inner.preferred_dc.as_deref(), std::time::Instant::now())?;
                let url = request::resolve_target(&selection.base_url, path)?;
                Ok((url, selection.host))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_bad_default_header() {
        let endpoints = vec![Endpoint::new("http://a:8080").unwrap()];
        let result = Client::builder(endpoints)
            .default_header("bad header", "v")
            .build();
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_from_config_builds() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "endpoints": [
                    {"base_url": "http://a:8080", "dc": "eu"},
                    {"base_url": "http://b:8080", "dc": "us"}
                ],
                "preferred_dc": "eu",
                "retry": {"max_attempts": 2}
            }"#,
        )
        .unwrap();
        let client = Client::from_config(&config).unwrap();
        assert_eq!(client.inner.policy.max_attempts, 2);
        assert_eq!(client.inner.preferred_dc.as_deref(), Some("eu"));
    }

    #[test]
    fn test_default_headers_present() {
        let client = Client::new(vec![Endpoint::new("http://a:8080").unwrap()]).unwrap();
        assert!(client.inner.default_headers.contains_key(USER_AGENT));
        assert_eq!(
            client.inner.default_headers.get(ACCEPT).unwrap(),
            "application/json"
        );
    }
}
