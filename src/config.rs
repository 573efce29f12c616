//! Configuration schema definitions.
//!
//! This module defines the file-level configuration for the client. All
//! types derive Serde traits so a client can be built from JSON config;
//! programmatic construction goes through [`crate::ClientBuilder`] instead.

use std::collections::HashMap;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ClientError;
use crate::resilience::policy::RetryPolicy;

/// Root configuration for the client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Ordered endpoint set. Fixed for the lifetime of the client.
    pub endpoints: Vec<EndpointConfig>,

    /// Optional data center label to prefer during selection.
    pub preferred_dc: Option<String>,

    /// Retry configuration.
    pub retry: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Default headers applied when the request does not set them.
    pub headers: HashMap<String, String>,
}

/// One endpoint entry.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL (e.g., "https://api-eu.example.com").
    pub base_url: String,

    /// Optional data center label.
    pub dc: Option<String>,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per call, including the first.
    pub max_attempts: u32,

    /// Status codes that count as retryable failures.
    pub retryable_statuses: Vec<u16>,

    /// Whether connection-level errors are retryable.
    pub retry_on_connection_errors: bool,

    /// Methods eligible for automatic retry.
    pub retryable_methods: Vec<String>,

    /// Base delay for exponential backoff in milliseconds.
    pub initial_backoff_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_backoff_ms: u64,

    /// Symmetric jitter fraction in [0, 1] (0.5 means +/-50%).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            retry_on_connection_errors: true,
            retryable_methods: vec![
                "GET".into(),
                "HEAD".into(),
                "OPTIONS".into(),
                "DELETE".into(),
            ],
            initial_backoff_ms: 100,
            max_backoff_ms: 2000,
            jitter_fraction: 0.5,
        }
    }
}

impl RetryConfig {
    /// Convert the schema into a validated [`RetryPolicy`].
    pub fn to_policy(&self) -> Result<RetryPolicy, ClientError> {
        let mut statuses = std::collections::HashSet::new();
        for code in &self.retryable_statuses {
            let status = StatusCode::from_u16(*code)
                .map_err(|_| ClientError::Config(format!("invalid status code {code}")))?;
            statuses.insert(status);
        }

        let mut methods = std::collections::HashSet::new();
        for name in &self.retryable_methods {
            let method = Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                .map_err(|_| ClientError::Config(format!("invalid method name {name:?}")))?;
            methods.insert(method);
        }

        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            retryable_statuses: statuses,
            retry_on_connection_errors: self.retry_on_connection_errors,
            retryable_methods: methods,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            jitter_fraction: self.jitter_fraction,
        })
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Per-call deadline (all attempts and waits included) in seconds.
    pub request_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub pool_idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 10,
            pool_idle_secs: 90,
        }
    }
}
