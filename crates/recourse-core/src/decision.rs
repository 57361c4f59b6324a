//! Recovery action decision table.
//!
//! Maps `(category, severity, attempt)` plus the effective strategy to the
//! next recovery action. Rules, first match wins:
//!
//! | Condition                              | Action                         |
//! |----------------------------------------|--------------------------------|
//! | severity critical, attempt >= 2        | escalate                       |
//! | authentication                         | fallback on 1, else escalate   |
//! | memory                                 | degrade on 1, else abort       |
//! | rate_limit                             | retry                          |
//! | validation                             | fallback                       |
//! | attempt 1                              | retry                          |
//! | attempt 2 with fallback options        | fallback                       |
//! | attempt 3 with degradation allowed     | degrade                        |
//! | cache allowed                          | cache                          |
//! | otherwise                              | abort                          |
//!
//! The table is a pure function: the same inputs always give the same action.

use crate::strategy::RecoveryStrategy;
use crate::types::{ErrorCategory, ErrorSeverity, RecoveryAction};

/// Choose the recovery action for a failed attempt (1-based).
pub fn decide_action(
    category: ErrorCategory,
    severity: ErrorSeverity,
    attempt: u32,
    strategy: &RecoveryStrategy,
) -> RecoveryAction {
    if severity == ErrorSeverity::Critical && attempt >= 2 {
        return RecoveryAction::Escalate;
    }

    match category {
        ErrorCategory::Authentication => {
            if attempt == 1 {
                RecoveryAction::Fallback
            } else {
                RecoveryAction::Escalate
            }
        }
        ErrorCategory::Memory => {
            if attempt == 1 {
                RecoveryAction::Degrade
            } else {
                RecoveryAction::Abort
            }
        }
        ErrorCategory::RateLimit => RecoveryAction::Retry,
        ErrorCategory::Validation => RecoveryAction::Fallback,
        _ => progressive(attempt, strategy),
    }
}

/// Escalating default for categories without a dedicated rule.
fn progressive(attempt: u32, strategy: &RecoveryStrategy) -> RecoveryAction {
    if attempt <= 1 {
        return RecoveryAction::Retry;
    }
    if attempt == 2 && !strategy.fallback_options.is_empty() {
        return RecoveryAction::Fallback;
    }
    if attempt == 3 && strategy.allow_degradation {
        return RecoveryAction::Degrade;
    }
    if strategy.allow_cache {
        return RecoveryAction::Cache;
    }
    RecoveryAction::Abort
}
