//! Resilient HTTP client for fleets of interchangeable endpoints.
//!
//! Given an ordered set of logically-equivalent base URLs (e.g. regional
//! replicas of one API), the client decides which endpoint each call goes
//! to, retries transient failures with jittered exponential backoff, and
//! tracks per-host health so failing hosts are temporarily avoided.
//!
//! # Architecture Overview
//!
//! ```text
//!  execute(request)
//!      │
//!      ▼
//!  ┌──────────┐   select    ┌──────────────┐
//!  │ dispatch │────────────▶│   balancer   │  DC-aware round robin,
//!  │   loop   │◀────────────│  + health    │  unhealthy-window skip
//!  └────┬─────┘  feedback   └──────────────┘
//!       │ attempt (body snapshot, merged headers, deadline)
//!       ▼
//!  ┌──────────┐   outcome   ┌──────────────┐
//!  │ reqwest  │────────────▶│  resilience  │  retry decision +
//!  │transport │             │policy/backoff│  jittered wait
//!  └──────────┘             └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use replica_client::{Client, Endpoint};
//!
//! # async fn run() -> replica_client::Result<()> {
//! let client = Client::builder(vec![
//!     Endpoint::new("https://api-eu.example.com")?.in_dc("eu"),
//!     Endpoint::new("https://api-us.example.com")?.in_dc("us"),
//! ])
//! .preferred_dc("eu")
//! .build()?;
//!
//! let health: serde_json::Value = client.get_json("/healthz").await?;
//! # Ok(())
//! # }
//! ```

pub mod balancer;
pub mod client;
pub mod config;
pub mod error;
pub mod resilience;

pub use balancer::Endpoint;
pub use client::{Body, Client, ClientBuilder, Request};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use resilience::policy::RetryPolicy;
