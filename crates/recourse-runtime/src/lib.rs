//! # recourse-runtime
//!
//! Async recovery orchestration on top of `recourse-core`.
//!
//! This crate supervises fallible async operations:
//! - Per-operation circuit breakers
//! - Retry with exponential backoff and jitter
//! - Named fallback executors
//! - A shared degradation level that throttles attempts
//! - A write-once result cache
//! - Bounded error history and aggregate metrics
//!
//! ## Important
//!
//! Classification and action decisions are made by the pure functions in
//! `recourse-core`. This crate only executes them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use recourse_runtime::{RecoveryOptions, RecoveryOrchestrator, RuntimeConfig};
//! use recourse_core::ErrorCategory;
//!
//! let orchestrator: RecoveryOrchestrator<String> = RecoveryOrchestrator::new(RuntimeConfig::default());
//!
//! let result = orchestrator
//!     .execute_with_recovery(
//!         || async { fetch_page().await },
//!         RecoveryOptions::new("fetch_page").category(ErrorCategory::Network),
//!     )
//!     .await;
//!
//! if !result.success {
//!     tracing::warn!(action = %result.action, "Page unavailable");
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod resilience;

pub use cache::RecoveryCache;
pub use config::{DegradationConfig, RuntimeConfig, DEFAULT_HISTORY_CAPACITY};
pub use context::ErrorContext;
pub use error::{ConfigError, RecoveryError};
pub use metrics::{MetricsRecorder, RecoveryMetrics};
pub use orchestrator::{
    RecoveryMetadata, RecoveryOptions, RecoveryOrchestrator, RecoveryOrchestratorBuilder,
    RecoveryResult,
};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
    DegradationController, FallbackExecutor, FallbackRegistry, ValueFallback,
};
