//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Calculate the wait before the next retry attempt.
///
/// `attempt` is zero-based and counts prior failed attempts, so the very
/// first retry waits roughly `initial`. The exponential delay is capped at
/// `max` and then scaled by `1 + U(-jitter_fraction, +jitter_fraction)`.
pub fn backoff_with_jitter(
    attempt: u32,
    initial: Duration,
    max: Duration,
    jitter_fraction: f64,
) -> Duration {
    let exponential = 2u32.saturating_pow(attempt);
    let capped = initial.saturating_mul(exponential).min(max);
    if jitter_fraction <= 0.0 {
        return capped;
    }

    let jitter = rand::thread_rng().gen_range(-jitter_fraction..=jitter_fraction);
    let scale = (1.0 + jitter).max(0.0);
    capped.mul_f64(scale)
}
