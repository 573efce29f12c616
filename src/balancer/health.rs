//! Passive per-host health tracking.
//!
//! # Responsibilities
//! - Count consecutive failures per host
//! - Maintain an "unhealthy until" window with exponential growth
//! - Reset state once the window elapses
//!
//! # Design Decisions
//! - The unhealthy window throttles how long a consistently-failing host is
//!   skipped by selection; it is independent of any single request's retry
//!   backoff
//! - The window only grows while failures keep arriving, and is cleared
//!   exactly when the next selection finds the clock past it

use std::time::{Duration, Instant};

/// Base unhealthy window after a single failure.
pub(crate) const UNHEALTHY_BASE: Duration = Duration::from_millis(500);

/// Upper bound on the unhealthy window.
pub(crate) const UNHEALTHY_CAP: Duration = Duration::from_secs(10);

/// Failure counts beyond this no longer widen the window.
const MAX_WINDOW_SHIFT: u32 = 5;

/// Health record for a single host, created lazily on first failure.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    /// Consecutive failure count since the last reset.
    pub consecutive_failures: u32,
    /// Host is skipped by selection until this instant, if set.
    pub unhealthy_until: Option<Instant>,
}

impl HealthState {
    /// Record one failure observed at `now` and extend the unhealthy window:
    /// `min(cap, base * 2^min(failures, 5))` past `now`. The window never
    /// moves backwards while failures keep arriving.
    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let shift = self.consecutive_failures.min(MAX_WINDOW_SHIFT);
        let window = UNHEALTHY_BASE.saturating_mul(1 << shift).min(UNHEALTHY_CAP);
        let until = now + window;
        self.unhealthy_until = Some(match self.unhealthy_until {
            Some(prev) if prev > until => prev,
            _ => until,
        });
    }

    /// Whether the host should be considered healthy at `now`.
    ///
    /// Crossing the end of the unhealthy window resets the record, so a host
    /// that recovered starts again from zero failures.
    pub fn is_healthy(&mut self, now: Instant) -> bool {
        match self.unhealthy_until {
            None => true,
            Some(until) if now >= until => {
                *self = HealthState::default();
                true
            }
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_grows_exponentially() {
        let now = Instant::now();
        let mut state = HealthState::default();

        state.record_failure(now);
        assert_eq!(state.unhealthy_until, Some(now + Duration::from_secs(1)));

        state.record_failure(now);
        assert_eq!(state.unhealthy_until, Some(now + Duration::from_secs(2)));

        state.record_failure(now);
        assert_eq!(state.consecutive_failures, 3);
        assert_eq!(state.unhealthy_until, Some(now + Duration::from_secs(4)));
    }

    #[test]
    fn test_window_is_capped() {
        let now = Instant::now();
        let mut state = HealthState::default();
        for _ in 0..10 {
            state.record_failure(now);
        }
        assert_eq!(state.unhealthy_until, Some(now + UNHEALTHY_CAP));
    }

    #[test]
    fn test_window_never_shrinks() {
        let now = Instant::now();
        let mut state = HealthState::default();
        for _ in 0..10 {
            state.record_failure(now);
        }
        let widest = state.unhealthy_until.unwrap();

        // Another failure observed at the same instant keeps the window in
        // place rather than recomputing it backwards.
        state.record_failure(now);
        assert!(state.unhealthy_until.unwrap() >= widest);
    }

    #[test]
    fn test_recovery_resets_counter() {
        let now = Instant::now();
        let mut state = HealthState::default();
        state.record_failure(now);
        state.record_failure(now);
        state.record_failure(now);

        assert!(!state.is_healthy(now + Duration::from_secs(3)));
        assert!(state.is_healthy(now + Duration::from_secs(4)));
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.unhealthy_until.is_none());
    }
}
