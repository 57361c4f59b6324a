//! Error history and aggregate recovery metrics.

use parking_lot::Mutex;
use recourse_core::{ErrorCategory, ErrorSeverity, RecoveryAction};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::config::DEFAULT_HISTORY_CAPACITY;
use crate::context::ErrorContext;

/// Aggregate counters, accumulated until [`MetricsRecorder::clear`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryMetrics {
    /// Failed attempts seen
    pub total_errors: u64,

    /// Calls that succeeded after at least one failed attempt
    pub successful_recoveries: u64,

    /// `successful_recoveries / total_errors`, 0 when no errors
    pub success_rate: f64,

    pub errors_by_category: BTreeMap<ErrorCategory, u64>,

    pub errors_by_severity: BTreeMap<ErrorSeverity, u64>,

    /// Recovery actions chosen for failed attempts
    pub actions_taken: BTreeMap<RecoveryAction, u64>,

    /// Degradation level when the snapshot was taken
    pub degradation_level: f64,
}

#[derive(Debug, Default)]
struct Inner {
    history: VecDeque<ErrorContext>,
    total_errors: u64,
    successful_recoveries: u64,
    errors_by_category: BTreeMap<ErrorCategory, u64>,
    errors_by_severity: BTreeMap<ErrorSeverity, u64>,
    actions_taken: BTreeMap<RecoveryAction, u64>,
}

/// Bounded error history plus counters.
///
/// History is a ring buffer: once `capacity` records are held, the oldest
/// is dropped for each new one.
#[derive(Debug)]
pub struct MetricsRecorder {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl MetricsRecorder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                history: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
                ..Inner::default()
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Count a failed attempt and append it to history.
    pub fn record_error(&self, context: ErrorContext) {
        let mut inner = self.inner.lock();

        inner.total_errors += 1;
        *inner.errors_by_category.entry(context.category).or_default() += 1;
        *inner.errors_by_severity.entry(context.severity).or_default() += 1;

        if inner.history.len() >= self.capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(context);
    }

    /// Count the action chosen for a failed attempt.
    pub fn record_action(&self, action: RecoveryAction) {
        *self.inner.lock().actions_taken.entry(action).or_default() += 1;
    }

    /// Count a call that succeeded after failing at least once.
    pub fn record_recovery(&self) {
        self.inner.lock().successful_recoveries += 1;
    }

    /// Snapshot of the counters, stamped with a degradation level.
    pub fn snapshot(&self, degradation_level: f64) -> RecoveryMetrics {
        let inner = self.inner.lock();

        let success_rate = if inner.total_errors > 0 {
            inner.successful_recoveries as f64 / inner.total_errors as f64
        } else {
            0.0
        };

        RecoveryMetrics {
            total_errors: inner.total_errors,
            successful_recoveries: inner.successful_recoveries,
            success_rate,
            errors_by_category: inner.errors_by_category.clone(),
            errors_by_severity: inner.errors_by_severity.clone(),
            actions_taken: inner.actions_taken.clone(),
            degradation_level,
        }
    }

    /// Copy of the history, newest last.
    pub fn history(&self) -> Vec<ErrorContext> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Drop history and zero every counter.
    pub fn clear(&self) {
        *self.inner.lock() = Inner::default();
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
