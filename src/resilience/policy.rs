//! Retry policy and the pure retry decision.
//!
//! # Responsibilities
//! - Classify transport errors into the kinds the decision cares about
//! - Decide, from one attempt's outcome, whether to try again
//!
//! # Design Decisions
//! - Pure function of (method, outcome, attempts, policy); no clock, no I/O
//! - Deadline expiry is never retried, regardless of method or budget
//! - Non-idempotent verbs are never auto-retried, even on a retryable status

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Method, StatusCode};

/// Controls how the dispatch loop retries failed attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget per call, including the first attempt. Values
    /// below 1 behave as 1.
    pub max_attempts: u32,

    /// Response statuses that count as retryable failures.
    pub retryable_statuses: HashSet<StatusCode>,

    /// Whether connection-level transport errors are retryable.
    pub retry_on_connection_errors: bool,

    /// Methods eligible for automatic retry.
    pub retryable_methods: HashSet<Method>,

    /// Delay before the first retry.
    pub initial_backoff: Duration,

    /// Upper bound on the exponential retry delay.
    pub max_backoff: Duration,

    /// Symmetric jitter applied to each delay, as a fraction in [0, 1].
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retryable_statuses: HashSet::from([
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
            ]),
            retry_on_connection_errors: true,
            retryable_methods: HashSet::from([
                Method::GET,
                Method::HEAD,
                Method::OPTIONS,
                Method::DELETE,
            ]),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            jitter_fraction: 0.5,
        }
    }
}

/// Transport error classes the retry decision distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be established (refused, resolution failure).
    Connect,
    /// The deadline fired while the attempt was in flight.
    TimedOut,
    /// Any other network-layer failure.
    Other,
}

impl TransportErrorKind {
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportErrorKind::TimedOut
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        }
    }
}

/// What one attempt produced: a response status, or a transport failure.
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome {
    Status(StatusCode),
    Transport(TransportErrorKind),
}

impl RetryPolicy {
    pub fn is_retryable_method(&self, method: &Method) -> bool {
        self.retryable_methods.contains(method)
    }

    /// Whether a response status would be retried for this method, ignoring
    /// the attempt budget.
    pub fn status_is_retryable(&self, status: StatusCode, method: &Method) -> bool {
        self.retryable_statuses.contains(&status) && self.is_retryable_method(method)
    }

    /// Decide whether to retry after `attempts` completed attempts.
    pub fn should_retry(&self, method: &Method, outcome: &AttemptOutcome, attempts: u32) -> bool {
        if attempts >= self.max_attempts.max(1) {
            return false;
        }
        match outcome {
            AttemptOutcome::Transport(TransportErrorKind::TimedOut) => false,
            AttemptOutcome::Transport(_) => {
                self.retry_on_connection_errors && self.is_retryable_method(method)
            }
            AttemptOutcome::Status(status) => self.status_is_retryable(*status, method),
        }
    }
}
