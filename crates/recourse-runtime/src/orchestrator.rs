//! Recovery orchestrator.
//!
//! Runs a protected operation in a supervised loop:
//! - Cache lookup before the first attempt
//! - Per-operation circuit breaker around every attempt
//! - Classification and decision table on every failure
//! - Retry / fallback / degrade / cache / skip / abort / escalate dispatch
//!
//! Failures never escape as errors or panics: the caller inspects
//! [`RecoveryResult::success`] and [`RecoveryResult::error`].

use recourse_core::{
    backoff_delay, classify, decide_action, ErrorCategory, RecoveryAction, RecoveryStrategy,
    StrategyOverride, StrategyTable,
};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::RecoveryCache;
use crate::config::{humantime_duration, RuntimeConfig};
use crate::context::ErrorContext;
use crate::error::{ConfigError, RecoveryError};
use crate::metrics::{MetricsRecorder, RecoveryMetrics};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerRegistry, CircuitState, DegradationController, FallbackExecutor,
    FallbackRegistry,
};

/// Per-call options for [`RecoveryOrchestrator::execute_with_recovery`].
#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    /// Name used for the circuit breaker, logs and history
    pub operation_name: String,

    /// Failure category; `Unknown` when not set
    pub category: Option<ErrorCategory>,

    /// Route attempts through the operation's circuit breaker
    pub enable_circuit_breaker: bool,

    /// Key for the result cache
    pub cache_key: Option<String>,

    /// Partial strategy merged over the category default for this call
    pub custom_strategy: Option<StrategyOverride>,

    /// Free-form metadata copied into every error record
    pub metadata: HashMap<String, String>,
}

impl RecoveryOptions {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            category: None,
            enable_circuit_breaker: true,
            cache_key: None,
            custom_strategy: None,
            metadata: HashMap::new(),
        }
    }

    pub fn category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn without_circuit_breaker(mut self) -> Self {
        self.enable_circuit_breaker = false;
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn strategy(mut self, strategy: StrategyOverride) -> Self {
        self.custom_strategy = Some(strategy);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Bookkeeping attached to every result.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryMetadata {
    /// Attempts made, including circuit-open rejections
    pub total_attempts: u32,

    #[serde(serialize_with = "humantime_duration::serialize")]
    pub elapsed: Duration,

    pub category: ErrorCategory,

    /// Effective strategy after merging the call's override
    pub strategy: RecoveryStrategy,

    pub degradation_level: f64,

    /// Whether the value came from the result cache
    pub cache_hit: bool,

    /// Fallback executor that produced the value, if any
    pub fallback_used: Option<String>,
}

/// Outcome of one [`RecoveryOrchestrator::execute_with_recovery`] call.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryResult<T> {
    pub success: bool,

    pub value: Option<T>,

    /// Terminal action. A success inside the retry loop reports `Retry`.
    pub action: RecoveryAction,

    #[serde(serialize_with = "serialize_optional_error")]
    pub error: Option<RecoveryError>,

    pub metadata: RecoveryMetadata,
}

impl<T> RecoveryResult<T> {
    /// Convert into a plain `Result`.
    pub fn into_result(self) -> Result<T, RecoveryError> {
        match (self.value, self.error) {
            (Some(value), _) if self.success => Ok(value),
            (_, Some(error)) => Err(error),
            _ => Err(RecoveryError::NoAttempts {
                operation: String::new(),
            }),
        }
    }
}

fn serialize_optional_error<S>(error: &Option<RecoveryError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Mutable state of one call.
struct CallState {
    started: Instant,
    category: ErrorCategory,
    strategy: RecoveryStrategy,
    attempt: u32,
}

/// Supervises protected operations producing values of type `T`.
///
/// # Architecture
/// - Strategy table and decision table from `recourse-core` (pure)
/// - Circuit breakers, degradation and metrics are `Arc`-shared so one
///   composition root can hand the same instances to orchestrators of
///   different payload types
/// - Result cache and fallback executors are per payload type
pub struct RecoveryOrchestrator<T>
where
    T: Clone + Send + Sync + 'static,
{
    config: RuntimeConfig,
    strategies: Arc<StrategyTable>,
    breakers: Arc<CircuitBreakerRegistry>,
    degradation: Arc<DegradationController>,
    recorder: Arc<MetricsRecorder>,
    cache: RecoveryCache<T>,
    fallbacks: FallbackRegistry<T>,
}

impl<T> RecoveryOrchestrator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Orchestrator with default strategies and no fallback executors.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            strategies: Arc::new(StrategyTable::new()),
            breakers: Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone())),
            degradation: Arc::new(DegradationController::new()),
            recorder: Arc::new(MetricsRecorder::new(config.history_capacity)),
            cache: RecoveryCache::new(),
            fallbacks: FallbackRegistry::new(),
            config,
        }
    }

    pub fn builder() -> RecoveryOrchestratorBuilder<T> {
        RecoveryOrchestratorBuilder::new()
    }

    /// Run `operation` under supervision.
    ///
    /// # Execution Flow
    /// 1. Serve from cache if `cache_key` is already populated
    /// 2. Resolve the circuit breaker and effective strategy
    /// 3. Attempt up to `max_retries` times, throttled by degradation
    /// 4. On failure: record, decide, dispatch the recovery action
    /// 5. Return a structured outcome
    pub async fn execute_with_recovery<F, Fut>(
        &self,
        mut operation: F,
        options: RecoveryOptions,
    ) -> RecoveryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let category = options.category.unwrap_or(ErrorCategory::Unknown);
        let mut state = CallState {
            started: Instant::now(),
            category,
            strategy: self
                .strategies
                .resolve(category, options.custom_strategy.as_ref()),
            attempt: 0,
        };

        if let Some(key) = &options.cache_key {
            if let Some(value) = self.cache.get(key).await {
                tracing::debug!(operation = %options.operation_name, key = %key, "Served from cache");
                let mut result = self.finish(&state, Ok(value), RecoveryAction::Cache);
                result.metadata.cache_hit = true;
                return result;
            }
        }

        let breaker: Option<Arc<CircuitBreaker>> = options
            .enable_circuit_breaker
            .then(|| self.breakers.get_or_create(&options.operation_name));

        let mut attempted_actions: Vec<RecoveryAction> = Vec::new();
        let mut last_error: Option<RecoveryError> = None;
        let mut last_action = RecoveryAction::Abort;

        while state.attempt < state.strategy.max_retries {
            state.attempt += 1;

            self.throttle(&options.operation_name).await;

            let outcome = match &breaker {
                Some(breaker) => breaker.execute(&mut operation).await,
                None => operation().await.map_err(RecoveryError::operation),
            };

            let error = match outcome {
                Ok(value) => {
                    if let Some(key) = &options.cache_key {
                        self.cache.insert_if_absent(key, value.clone()).await;
                    }
                    if state.attempt > 1 {
                        self.recorder.record_recovery();
                        tracing::info!(
                            operation = %options.operation_name,
                            attempts = state.attempt,
                            "Operation recovered"
                        );
                    }
                    return self.finish(&state, Ok(value), RecoveryAction::Retry);
                }
                Err(error) => error,
            };

            let severity = classify(&error.to_string(), category);
            let context = ErrorContext::new(
                error.clone(),
                category,
                severity,
                options.operation_name.as_str(),
                state.attempt,
            )
            .with_metadata(options.metadata.clone())
            .with_attempted_actions(attempted_actions.clone());
            self.recorder.record_error(context.clone());

            let action = decide_action(category, severity, state.attempt, &state.strategy);
            self.recorder.record_action(action);
            attempted_actions.push(action);
            last_action = action;
            last_error = Some(error);

            tracing::warn!(
                operation = %options.operation_name,
                attempt = state.attempt,
                category = %category,
                severity = %severity,
                action = %action,
                error = %context.error,
                "Attempt failed"
            );

            let attempts_left = state.attempt < state.strategy.max_retries;

            match action {
                RecoveryAction::Retry => {
                    if attempts_left {
                        self.backoff(&state).await;
                    }
                }
                RecoveryAction::Fallback => {
                    if let Some((name, value)) = self
                        .fallbacks
                        .execute_chain(&state.strategy.fallback_options, &context)
                        .await
                    {
                        self.recorder.record_recovery();
                        let mut result = self.finish(&state, Ok(value), RecoveryAction::Fallback);
                        result.metadata.fallback_used = Some(name);
                        return result;
                    }
                }
                RecoveryAction::Degrade => {
                    self.degradation.degrade(self.config.degradation.step);
                    if attempts_left {
                        self.backoff(&state).await;
                    }
                }
                RecoveryAction::Cache => {
                    if let Some(key) = &options.cache_key {
                        if let Some(value) = self.cache.get(key).await {
                            self.recorder.record_recovery();
                            let mut result = self.finish(&state, Ok(value), RecoveryAction::Cache);
                            result.metadata.cache_hit = true;
                            return result;
                        }
                    }
                }
                RecoveryAction::Skip => {
                    return self.finish(&state, Err(context.error), RecoveryAction::Skip);
                }
                RecoveryAction::Abort => break,
                RecoveryAction::Escalate => {
                    tracing::error!(
                        operation = %context.operation_name,
                        attempt = context.attempt,
                        category = %context.category,
                        severity = %context.severity,
                        attempted_actions = ?context.attempted_actions,
                        metadata = ?context.metadata,
                        error = %context.error,
                        "Escalating failure for human attention"
                    );
                    break;
                }
            }
        }

        let error = last_error.unwrap_or_else(|| RecoveryError::NoAttempts {
            operation: options.operation_name.clone(),
        });
        self.finish(&state, Err(error), last_action)
    }

    /// Pre-attempt delay while the system is degraded.
    async fn throttle(&self, operation: &str) {
        let level = self.degradation.level();
        if level <= 0.0 {
            return;
        }

        let delay = self.config.degradation.delay_for(level);
        tracing::debug!(operation, level, delay = ?delay, "Throttling degraded attempt");
        tokio::time::sleep(delay).await;
    }

    async fn backoff(&self, state: &CallState) {
        let delay = backoff_delay(&state.strategy, state.attempt, rand::random::<f64>());
        tracing::debug!(attempt = state.attempt, delay = ?delay, "Backing off");
        tokio::time::sleep(delay).await;
    }

    fn finish(
        &self,
        state: &CallState,
        outcome: Result<T, RecoveryError>,
        action: RecoveryAction,
    ) -> RecoveryResult<T> {
        let metadata = RecoveryMetadata {
            total_attempts: state.attempt,
            elapsed: state.started.elapsed(),
            category: state.category,
            strategy: state.strategy.clone(),
            degradation_level: self.degradation.level(),
            cache_hit: false,
            fallback_used: None,
        };

        match outcome {
            Ok(value) => RecoveryResult {
                success: true,
                value: Some(value),
                action,
                error: None,
                metadata,
            },
            Err(error) => RecoveryResult {
                success: false,
                value: None,
                action,
                error: Some(error),
                metadata,
            },
        }
    }

    /// Snapshot of aggregate metrics.
    pub fn metrics(&self) -> RecoveryMetrics {
        self.recorder.snapshot(self.degradation.level())
    }

    /// Copy of the error history, newest last.
    pub fn error_history(&self) -> Vec<ErrorContext> {
        self.recorder.history()
    }

    pub fn degradation_level(&self) -> f64 {
        self.degradation.level()
    }

    pub fn reset_degradation(&self) {
        self.degradation.reset();
    }

    pub fn reset_circuit_breakers(&self) {
        self.breakers.reset_all();
    }

    /// Clear history and metrics. The degradation level is kept.
    pub fn clear_history(&self) {
        self.recorder.clear();
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    /// State of an operation's breaker, if it has been used.
    pub fn circuit_state(&self, operation: &str) -> Option<CircuitState> {
        self.breakers.get(operation).map(|b| b.state())
    }

    /// Registered (un-overridden) strategy for a category.
    pub fn strategy(&self, category: ErrorCategory) -> &RecoveryStrategy {
        self.strategies.get(category)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn degradation(&self) -> &Arc<DegradationController> {
        &self.degradation
    }

    pub fn recorder(&self) -> &Arc<MetricsRecorder> {
        &self.recorder
    }
}

impl<T> Default for RecoveryOrchestrator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

/// Builder for RecoveryOrchestrator.
pub struct RecoveryOrchestratorBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    config: RuntimeConfig,
    strategies: Option<Arc<StrategyTable>>,
    breakers: Option<Arc<CircuitBreakerRegistry>>,
    degradation: Option<Arc<DegradationController>>,
    recorder: Option<Arc<MetricsRecorder>>,
    fallbacks: FallbackRegistry<T>,
}

impl<T> RecoveryOrchestratorBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            strategies: None,
            breakers: None,
            degradation: None,
            recorder: None,
            fallbacks: FallbackRegistry::new(),
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom strategy table.
    pub fn strategies(mut self, strategies: StrategyTable) -> Self {
        self.strategies = Some(Arc::new(strategies));
        self
    }

    /// Share a strategy table with other orchestrators.
    pub fn shared_strategies(mut self, strategies: Arc<StrategyTable>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    /// Share circuit breakers with other orchestrators.
    pub fn circuit_breakers(mut self, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    /// Share the degradation level with other orchestrators.
    pub fn degradation(mut self, degradation: Arc<DegradationController>) -> Self {
        self.degradation = Some(degradation);
        self
    }

    /// Share history and metrics with other orchestrators.
    pub fn recorder(mut self, recorder: Arc<MetricsRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Register a fallback executor.
    pub fn fallback(mut self, executor: Arc<dyn FallbackExecutor<T>>) -> Self {
        self.fallbacks.register(executor);
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<RecoveryOrchestrator<T>, ConfigError> {
        self.config.validate()?;

        let config = self.config;

        Ok(RecoveryOrchestrator {
            strategies: self
                .strategies
                .unwrap_or_else(|| Arc::new(StrategyTable::new())),
            breakers: self.breakers.unwrap_or_else(|| {
                Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone()))
            }),
            degradation: self
                .degradation
                .unwrap_or_else(|| Arc::new(DegradationController::new())),
            recorder: self
                .recorder
                .unwrap_or_else(|| Arc::new(MetricsRecorder::new(config.history_capacity))),
            cache: RecoveryCache::new(),
            fallbacks: self.fallbacks,
            config,
        })
    }
}

impl<T> Default for RecoveryOrchestratorBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
