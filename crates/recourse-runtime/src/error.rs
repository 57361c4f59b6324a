//! Runtime error types.

use std::sync::Arc;
use thiserror::Error;

/// Failure of a protected call, as seen by the orchestrator.
///
/// Cloneable so the same error can sit in history, metrics and the
/// returned result at once.
#[derive(Error, Debug, Clone)]
pub enum RecoveryError {
    /// The operation's breaker is open; the operation was not invoked.
    #[error("Circuit breaker is open for operation '{operation}'")]
    CircuitOpen { operation: String },

    /// The protected operation returned an error.
    #[error("{0}")]
    Operation(Arc<anyhow::Error>),

    #[error("No fallback executor registered for '{name}'")]
    FallbackUnavailable { name: String },

    #[error("Fallback '{name}' failed: {cause}")]
    FallbackFailed {
        name: String,
        cause: Arc<anyhow::Error>,
    },

    /// The strategy allowed zero attempts.
    #[error("Strategy for '{operation}' allows no attempts")]
    NoAttempts { operation: String },
}

impl RecoveryError {
    pub fn operation(error: anyhow::Error) -> Self {
        RecoveryError::Operation(Arc::new(error))
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RecoveryError::CircuitOpen { .. })
    }

    /// Underlying operation error, if this wraps one.
    pub fn as_operation_error(&self) -> Option<&anyhow::Error> {
        match self {
            RecoveryError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for RecoveryError {
    fn from(error: anyhow::Error) -> Self {
        RecoveryError::operation(error)
    }
}

/// Errors from loading runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_display_is_transparent() {
        let err = RecoveryError::operation(anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "connection refused");
        assert!(err.as_operation_error().is_some());
    }

    #[test]
    fn test_circuit_open_display() {
        let err = RecoveryError::CircuitOpen {
            operation: "embed".to_string(),
        };
        assert!(err.is_circuit_open());
        assert!(err.to_string().contains("embed"));
    }

    #[test]
    fn test_clone_shares_source() {
        let err = RecoveryError::operation(anyhow::anyhow!("boom"));
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
