//! Endpoint selection subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch loop needs an endpoint for an attempt
//!     → select() (preferred-DC round robin, skip unhealthy hosts)
//!     → fall back to global round robin, skip unhealthy hosts
//!     → last resort: next endpoint in global order even if unhealthy
//! Attempt outcome comes back
//!     → record_failure() (health.rs: widen unhealthy window)
//!     → advance() between retries (bias next selection off the failed host)
//! ```
//!
//! # Design Decisions
//! - Two persistent round-robin cursors: one over the preferred-DC subset,
//!   one over the full list
//! - A fully-unhealthy fleet is still attempted; availability wins over
//!   strict health enforcement
//! - All cursor and health state sits behind one mutex; selection and
//!   feedback are O(number of endpoints)

pub mod health;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use url::Url;

use crate::error::ClientError;
use health::HealthState;

/// A single backend instance, optionally tagged with a data center label.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Base URL every relative request path is resolved against.
    pub base_url: Url,
    /// Optional data center label used by preferred-DC selection.
    pub dc: Option<String>,
}

impl Endpoint {
    /// Parse a base URL into an endpoint with no DC label.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            dc: None,
        })
    }

    /// Tag the endpoint with a data center label.
    pub fn in_dc(mut self, dc: &str) -> Self {
        self.dc = Some(dc.to_string());
        self
    }
}

/// Outcome of one selection: where to send the attempt, and the host key to
/// report failure feedback against.
#[derive(Debug, Clone)]
pub struct Selection {
    pub base_url: Url,
    pub host: String,
}

/// `host:port` key used for the health map.
pub(crate) fn host_key(url: &Url) -> String {
    match (url.host_str(), url.port_or_known_default()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => url.as_str().to_string(),
    }
}

#[derive(Debug)]
struct Slot {
    base_url: Url,
    dc: Option<String>,
    host: String,
}

#[derive(Debug, Default)]
struct BalancerState {
    rr_all: usize,
    rr_preferred: usize,
    health: HashMap<String, HealthState>,
}

/// Health-aware round-robin selector over a fixed endpoint list.
///
/// Shared by every in-flight call on one client; all mutable state lives
/// behind a single lock and is only reachable through the three methods
/// below.
#[derive(Debug)]
pub struct Balancer {
    slots: Vec<Slot>,
    state: Mutex<BalancerState>,
}

impl Balancer {
    pub fn new(endpoints: &[Endpoint]) -> Self {
        let slots = endpoints
            .iter()
            .map(|ep| Slot {
                host: host_key(&ep.base_url),
                base_url: ep.base_url.clone(),
                dc: ep.dc.clone(),
            })
            .collect();
        Self {
            slots,
            state: Mutex::new(BalancerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BalancerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn dc_subset(&self, dc: &str) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.dc.as_deref() == Some(dc))
            .map(|(i, _)| i)
            .collect()
    }

    fn selection(&self, idx: usize) -> Selection {
        Selection {
            base_url: self.slots[idx].base_url.clone(),
            host: self.slots[idx].host.clone(),
        }
    }

    /// Choose the endpoint for the next attempt.
    ///
    /// Preferred-DC endpoints are rotated through first; if none of them is
    /// healthy the full list is rotated through; if every host is inside its
    /// unhealthy window the next endpoint in global order is returned anyway.
    pub fn select(
        &self,
        preferred_dc: Option<&str>,
        now: Instant,
    ) -> Result<Selection, ClientError> {
        if self.slots.is_empty() {
            return Err(ClientError::NoEndpoints);
        }
        let mut state = self.lock();

        if let Some(dc) = preferred_dc {
            let subset = self.dc_subset(dc);
            for _ in 0..subset.len() {
                let idx = subset[state.rr_preferred % subset.len()];
                state.rr_preferred = state.rr_preferred.wrapping_add(1);
                if self.slot_is_healthy(&mut state, idx, now) {
                    return Ok(self.selection(idx));
                }
            }
        }

        let len = self.slots.len();
        for _ in 0..len {
            let idx = state.rr_all % len;
            state.rr_all = state.rr_all.wrapping_add(1);
            if self.slot_is_healthy(&mut state, idx, now) {
                return Ok(self.selection(idx));
            }
        }

        // Every host is unhealthy. A fully-down fleet must still be
        // attempted, so hand out the next endpoint in global order.
        let idx = state.rr_all % len;
        tracing::debug!(host = %self.slots[idx].host, "all endpoints unhealthy, selecting anyway");
        Ok(self.selection(idx))
    }

    /// Advance whichever cursor the next selection would consult first, so a
    /// retry is biased away from the endpoint that just failed.
    pub fn advance(&self, preferred_dc: Option<&str>) {
        let mut state = self.lock();
        if let Some(dc) = preferred_dc {
            if !self.dc_subset(dc).is_empty() {
                state.rr_preferred = state.rr_preferred.wrapping_add(1);
                return;
            }
        }
        state.rr_all = state.rr_all.wrapping_add(1);
    }

    /// Record one failure against a host, widening its unhealthy window.
    pub fn record_failure(&self, host: &str, now: Instant) {
        let mut state = self.lock();
        let entry = state.health.entry(host.to_string()).or_default();
        entry.record_failure(now);
        tracing::debug!(
            host = %host,
            failures = entry.consecutive_failures,
            "endpoint failure recorded"
        );
    }

    fn slot_is_healthy(&self, state: &mut BalancerState, idx: usize, now: Instant) -> bool {
        match state.health.get_mut(&self.slots[idx].host) {
            Some(health) => health.is_healthy(now),
            None => true,
        }
    }
}
