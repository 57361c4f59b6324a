//! # recourse-core
//!
//! Deterministic recovery policy for failing operations.
//!
//! This crate answers, for a single failed attempt:
//! - How bad is it? ([`classify`])
//! - What are the retry economics for this kind of failure? ([`StrategyTable`])
//! - What should happen next? ([`decide_action`])
//! - How long should we wait? ([`backoff_delay`])
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces the same decision
//! 2. **No I/O on the hot path**: classification and decisions are pure
//! 3. **Exhaustive**: every [`ErrorCategory`] has a built-in strategy
//!
//! The async orchestration loop lives in `recourse-runtime`.
//!
//! ## Example
//!
//! ```rust
//! use recourse_core::{classify, decide_action, ErrorCategory, RecoveryAction, StrategyTable};
//!
//! let table = StrategyTable::new();
//! let strategy = table.resolve(ErrorCategory::Network, None);
//! let severity = classify("connection reset by peer", ErrorCategory::Network);
//!
//! assert_eq!(
//!     decide_action(ErrorCategory::Network, severity, 1, &strategy),
//!     RecoveryAction::Retry
//! );
//! ```

pub mod backoff;
pub mod classifier;
pub mod decision;
pub mod strategy;
pub mod types;

// Re-export main types at crate root
pub use backoff::{backoff_delay, capped_delay};
pub use classifier::{classify, ErrorClassifier};
pub use decision::decide_action;
pub use strategy::{RecoveryStrategy, StrategyError, StrategyOverride, StrategyTable};
pub use types::{ErrorCategory, ErrorSeverity, RecoveryAction, UnknownCategory};
