//! Pluggable fallback executors.
//!
//! A strategy lists fallback options by name (`"cache"`,
//! `"alternative_model"`, `"default_values"`, ...). The embedder registers an
//! executor for each name it can actually serve. A name with no executor
//! fails deterministically so the orchestrator moves on.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::ErrorContext;
use crate::error::RecoveryError;

/// Capability that can produce a substitute result for a failed call.
#[async_trait]
pub trait FallbackExecutor<T: Send + 'static>: Send + Sync {
    /// Option name this executor serves, as listed in strategies.
    fn name(&self) -> &str;

    /// Try to produce a substitute value for the failure in `context`.
    async fn try_execute(&self, context: &ErrorContext) -> anyhow::Result<T>;
}

/// Executor that always returns the same value.
///
/// Typically registered as `"default_values"`.
pub struct ValueFallback<T> {
    name: String,
    value: T,
}

impl<T> ValueFallback<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[async_trait]
impl<T> FallbackExecutor<T> for ValueFallback<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_execute(&self, _context: &ErrorContext) -> anyhow::Result<T> {
        Ok(self.value.clone())
    }
}

/// Named fallback executors.
pub struct FallbackRegistry<T: Send + 'static> {
    executors: BTreeMap<String, Arc<dyn FallbackExecutor<T>>>,
}

impl<T: Send + 'static> Default for FallbackRegistry<T> {
    fn default() -> Self {
        Self {
            executors: BTreeMap::new(),
        }
    }
}

impl<T> FallbackRegistry<T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under its own name.
    ///
    /// An executor with the same name is replaced.
    pub fn register(&mut self, executor: Arc<dyn FallbackExecutor<T>>) {
        let name = executor.name().to_string();
        if self.executors.insert(name.clone(), executor).is_some() {
            tracing::debug!(fallback = %name, "Replaced fallback executor");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }

    /// Run one named fallback.
    pub async fn execute(&self, name: &str, context: &ErrorContext) -> Result<T, RecoveryError> {
        let executor = self
            .executors
            .get(name)
            .ok_or_else(|| RecoveryError::FallbackUnavailable {
                name: name.to_string(),
            })?;

        executor
            .try_execute(context)
            .await
            .map_err(|e| RecoveryError::FallbackFailed {
                name: name.to_string(),
                cause: Arc::new(e),
            })
    }

    /// Try each option in order and return the first success with its name.
    pub async fn execute_chain(
        &self,
        options: &[String],
        context: &ErrorContext,
    ) -> Option<(String, T)> {
        for name in options {
            match self.execute(name, context).await {
                Ok(value) => {
                    tracing::info!(
                        operation = %context.operation_name,
                        fallback = %name,
                        "Fallback succeeded"
                    );
                    return Some((name.clone(), value));
                }
                Err(e) => {
                    tracing::debug!(
                        operation = %context.operation_name,
                        fallback = %name,
                        error = %e,
                        "Fallback failed"
                    );
                }
            }
        }
        None
    }
}
