//! Resilience patterns for recourse-runtime.
//!
//! This module provides:
//! - Circuit breakers, one per operation name
//! - The shared degradation level
//! - Named fallback executors

mod circuit_breaker;
mod degradation;
mod fallback;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use degradation::DegradationController;
pub use fallback::{FallbackExecutor, FallbackRegistry, ValueFallback};
