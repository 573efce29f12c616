//! Error definitions for the client.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while dispatching a request.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client was asked to select an endpoint but none are configured.
    #[error("no endpoints configured")]
    NoEndpoints,

    /// Invalid client configuration (bad URL, unknown method name, bad header).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Connection-level failure surfaced by the transport.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The per-call deadline elapsed, either mid-flight or during a backoff
    /// wait. Never retried.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// Every attempt returned a retryable status and the attempt budget ran
    /// out. Carries the status of the last attempt.
    #[error("status {status} after {attempts} attempts")]
    ExhaustedStatus { status: StatusCode, attempts: u32 },

    /// A final response carried a non-2xx status that was never eligible for
    /// retry. Only produced by the JSON convenience surface; the core hands
    /// such responses back to the caller as-is.
    #[error("unexpected status: {status}")]
    UnexpectedStatus { status: StatusCode },

    /// Response body failed to parse. Never retried.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// A request value failed to serialize to JSON.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// A relative path could not be resolved against the selected base URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Reading the caller-supplied body stream failed before the first attempt.
    #[error("failed to buffer request body: {0}")]
    BodyRead(#[source] std::io::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
