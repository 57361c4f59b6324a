//! Circuit breaker to prevent hammering a failing operation.
//!
//! Each operation name gets its own breaker, created lazily by the
//! [`CircuitBreakerRegistry`]. When an operation fails repeatedly the
//! circuit opens and calls are rejected without invoking it until the
//! recovery timeout has elapsed.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::humantime_duration;
use crate::error::RecoveryError;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time after the last failure before a probe is allowed
    #[serde(with = "humantime_duration")]
    pub recovery_timeout: Duration,

    /// Consecutive probe successes needed to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Calls are rejected until the recovery timeout passes
    Open { opened_at: Instant },

    /// Probing whether the operation has recovered
    HalfOpen { successes: u32 },
}

impl CircuitState {
    pub fn name(&self) -> &'static str {
        match self {
            CircuitState::Closed { .. } => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen { .. } => "half_open",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, CircuitState::Open { .. })
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,

    /// Only one half-open probe may run at a time
    probe_in_flight: bool,

    /// Bumped whenever the circuit opens or is reset; outcomes of calls
    /// admitted under an older generation are discarded
    generation: u64,
}

/// Three-state gate for a single operation name.
///
/// Counters sit behind a mutex that is never held across an await, so
/// concurrent calls sharing an operation name see one source of truth.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed { failures: 0 },
                probe_in_flight: false,
                generation: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` through the breaker.
    ///
    /// Returns [`RecoveryError::CircuitOpen`] without invoking the operation
    /// while the circuit is open and no probe is due. A call admitted before
    /// the circuit opened does not count toward the next half-open cycle.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, RecoveryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let permit = self.acquire()?;
        let outcome = operation().await;
        permit.complete(outcome.is_ok());
        outcome.map_err(RecoveryError::operation)
    }

    /// Admit a call or reject it.
    fn acquire(&self) -> Result<Permit<'_>, RecoveryError> {
        let mut inner = self.inner.lock();
        let generation = inner.generation;

        match inner.state {
            CircuitState::Closed { .. } => Ok(Permit::new(self, generation, false)),
            CircuitState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    inner.state = CircuitState::HalfOpen { successes: 0 };
                    inner.probe_in_flight = true;
                    tracing::info!(
                        operation = %self.name,
                        "Circuit transitioning to half-open for recovery probe"
                    );
                    Ok(Permit::new(self, generation, true))
                } else {
                    Err(self.open_error())
                }
            }
            CircuitState::HalfOpen { .. } => {
                if inner.probe_in_flight {
                    Err(self.open_error())
                } else {
                    inner.probe_in_flight = true;
                    Ok(Permit::new(self, generation, true))
                }
            }
        }
    }

    fn open_error(&self) -> RecoveryError {
        RecoveryError::CircuitOpen {
            operation: self.name.clone(),
        }
    }

    /// Record a successful call made outside [`CircuitBreaker::execute`].
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.probe_in_flight = false;
        self.on_success(&mut inner);
    }

    /// Record a failed call made outside [`CircuitBreaker::execute`].
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.probe_in_flight = false;
        self.on_failure(&mut inner);
    }

    fn on_success(&self, inner: &mut Inner) {
        match inner.state {
            CircuitState::HalfOpen { successes } => {
                if successes + 1 >= self.config.success_threshold {
                    inner.state = CircuitState::Closed { failures: 0 };
                    tracing::info!(operation = %self.name, "Circuit closed after successful recovery");
                } else {
                    inner.state = CircuitState::HalfOpen {
                        successes: successes + 1,
                    };
                }
            }
            CircuitState::Closed { .. } => {
                inner.state = CircuitState::Closed { failures: 0 };
            }
            CircuitState::Open { .. } => {}
        }
    }

    fn on_failure(&self, inner: &mut Inner) {
        match inner.state {
            CircuitState::Closed { failures } => {
                if failures + 1 >= self.config.failure_threshold {
                    Self::open(inner);
                    tracing::warn!(
                        operation = %self.name,
                        failures = failures + 1,
                        "Circuit opened after repeated failures"
                    );
                } else {
                    inner.state = CircuitState::Closed {
                        failures: failures + 1,
                    };
                }
            }
            CircuitState::HalfOpen { .. } => {
                Self::open(inner);
                tracing::warn!(operation = %self.name, "Circuit reopened after failed recovery probe");
            }
            CircuitState::Open { .. } => {
                // Still failing while open; restart the cooldown
                inner.state = CircuitState::Open {
                    opened_at: Instant::now(),
                };
            }
        }
    }

    fn open(inner: &mut Inner) {
        inner.state = CircuitState::Open {
            opened_at: Instant::now(),
        };
        inner.probe_in_flight = false;
        inner.generation += 1;
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Force the circuit closed with all counters zeroed.
    ///
    /// Calls still in flight from before the reset are not counted.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed { failures: 0 };
        inner.probe_in_flight = false;
        inner.generation += 1;
    }
}

/// Admission ticket for one call.
///
/// Carries the generation it was issued under and whether it holds the
/// half-open probe slot. Dropping an unfinished probe (a cancelled call)
/// frees the slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, generation: u64, probe: bool) -> Self {
        Self {
            breaker,
            generation,
            probe,
        }
    }

    /// Apply the call's outcome, unless the circuit has moved on since the
    /// call was admitted.
    fn complete(mut self, success: bool) {
        let breaker = self.breaker;
        let mut inner = breaker.inner.lock();

        if inner.generation == self.generation {
            if self.probe {
                inner.probe_in_flight = false;
            }
            if success {
                breaker.on_success(&mut inner);
            } else {
                breaker.on_failure(&mut inner);
            }
        } else {
            tracing::debug!(
                operation = %breaker.name,
                success,
                "Discarding outcome of a call admitted before the circuit changed"
            );
        }

        self.probe = false;
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.probe {
            return;
        }
        let mut inner = self.breaker.inner.lock();
        if inner.generation == self.generation {
            inner.probe_in_flight = false;
        }
    }
}

/// Lazily populated breakers, one per operation name.
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Breaker for an operation name, created on first use.
    pub fn get_or_create(&self, operation: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(operation) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write();
        Arc::clone(breakers.entry(operation.to_string()).or_insert_with(|| {
            tracing::debug!(operation, "Creating circuit breaker");
            Arc::new(CircuitBreaker::new(operation, self.config.clone()))
        }))
    }

    /// Breaker for an operation name, if one exists.
    pub fn get(&self, operation: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(operation).cloned()
    }

    /// Snapshot of every breaker's state, ordered by name.
    pub fn states(&self) -> BTreeMap<String, CircuitState> {
        self.breakers
            .read()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }

    /// Reset one breaker. Returns false if none exists for the name.
    pub fn reset(&self, operation: &str) -> bool {
        match self.get(operation) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset all breakers to closed.
    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
