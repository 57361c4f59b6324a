//! Exponential backoff with proportional jitter.
//!
//! `capped = min(base * multiplier^(attempt - 1), max)` and the final delay
//! is `capped + capped * jitter * sample`, with `sample` in `[0, 1)`.
//! The random sample is supplied by the caller so this module stays pure.

use std::time::Duration;

use crate::strategy::RecoveryStrategy;

/// Un-jittered delay for a 1-based attempt, capped at `max_delay`.
pub fn capped_delay(strategy: &RecoveryStrategy, attempt: u32) -> Duration {
    if strategy.base_delay_ms == 0 {
        return Duration::ZERO;
    }

    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let raw = strategy.base_delay_ms as f64 * strategy.backoff_multiplier.powi(exponent);
    let capped = raw.min(strategy.max_delay_ms as f64);

    if capped.is_finite() && capped > 0.0 {
        Duration::from_secs_f64(capped / 1000.0)
    } else {
        Duration::ZERO
    }
}

/// Delay before the next attempt, with `sample` drawn from `[0, 1)`.
pub fn backoff_delay(strategy: &RecoveryStrategy, attempt: u32, sample: f64) -> Duration {
    let capped = capped_delay(strategy, attempt);
    let factor = strategy.jitter.clamp(0.0, 1.0) * sample.clamp(0.0, 1.0);
    capped + capped.mul_f64(factor)
}
