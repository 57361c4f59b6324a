//! Process-wide degradation level.
//!
//! A single scalar in `[0.0, 1.0]` that slows every attempt down while the
//! system is under sustained failure. Raised by degrade actions, cleared
//! only by an explicit reset.

use std::sync::atomic::{AtomicU32, Ordering};

/// Fixed-point resolution: the level is stored in basis points.
const SCALE: f64 = 10_000.0;
const MAX_LEVEL: u32 = 10_000;

/// Shared throttle level.
///
/// Stored as basis points in an atomic so repeated 0.1 steps land exactly
/// on 1.0 and concurrent degrade actions never lose an increment.
#[derive(Debug, Default)]
pub struct DegradationController {
    level: AtomicU32,
}

impl DegradationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level in `[0.0, 1.0]`.
    pub fn level(&self) -> f64 {
        self.level.load(Ordering::SeqCst) as f64 / SCALE
    }

    /// Raise the level by `step`, clamped to 1.0. Returns the new level.
    pub fn degrade(&self, step: f64) -> f64 {
        let step = (step.clamp(0.0, 1.0) * SCALE).round() as u32;
        let previous = self
            .level
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(step).min(MAX_LEVEL))
            })
            .unwrap_or_else(|current| current);

        let level = previous.saturating_add(step).min(MAX_LEVEL) as f64 / SCALE;
        tracing::warn!(level, "Degradation level increased");
        level
    }

    /// Return the level to 0.
    pub fn reset(&self) {
        self.level.store(0, Ordering::SeqCst);
        tracing::info!("Degradation level reset");
    }

    pub fn is_degraded(&self) -> bool {
        self.level.load(Ordering::SeqCst) > 0
    }
}
