//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt outcome (status or transport error):
//!     → policy.rs (pure decision: retry or stop)
//!     → On retry: backoff.rs (jittered exponential wait)
//! ```
//!
//! # Design Decisions
//! - Retries only for methods the policy lists as retryable (idempotent
//!   verbs by default; POST/PUT/PATCH are never auto-retried)
//! - Deadline expiry always beats the retry policy
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod policy;
