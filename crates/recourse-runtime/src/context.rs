//! Record of a single failed attempt.

use chrono::{DateTime, Utc};
use recourse_core::{ErrorCategory, ErrorSeverity, RecoveryAction};
use serde::{Serialize, Serializer};
use std::collections::HashMap;

use crate::error::RecoveryError;

/// One failed attempt of a protected operation.
///
/// Built by the orchestrator right after the failure and never changed
/// afterwards; history hands out clones.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    /// The failure, serialized as its message
    #[serde(serialize_with = "serialize_error")]
    pub error: RecoveryError,

    pub category: ErrorCategory,

    pub severity: ErrorSeverity,

    pub operation_name: String,

    pub timestamp: DateTime<Utc>,

    /// 1-based attempt number within the call
    pub attempt: u32,

    /// Caller-supplied metadata for the call
    pub metadata: HashMap<String, String>,

    /// Actions already taken earlier in the same call, oldest first
    pub attempted_actions: Vec<RecoveryAction>,
}

impl ErrorContext {
    pub fn new(
        error: RecoveryError,
        category: ErrorCategory,
        severity: ErrorSeverity,
        operation_name: impl Into<String>,
        attempt: u32,
    ) -> Self {
        Self {
            error,
            category,
            severity,
            operation_name: operation_name.into(),
            timestamp: Utc::now(),
            attempt,
            metadata: HashMap::new(),
            attempted_actions: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_attempted_actions(mut self, actions: Vec<RecoveryAction>) -> Self {
        self.attempted_actions = actions;
        self
    }

    /// Error message, as used for classification.
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

fn serialize_error<S>(error: &RecoveryError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_error_as_message() {
        let context = ErrorContext::new(
            RecoveryError::operation(anyhow::anyhow!("connection reset")),
            ErrorCategory::Network,
            ErrorSeverity::Medium,
            "fetch",
            2,
        )
        .with_attempted_actions(vec![RecoveryAction::Retry]);

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["error"], "connection reset");
        assert_eq!(json["category"], "network");
        assert_eq!(json["severity"], "medium");
        assert_eq!(json["attempt"], 2);
        assert_eq!(json["attempted_actions"][0], "retry");
    }

    #[test]
    fn test_metadata_is_attached() {
        let metadata = HashMap::from([("model".to_string(), "llama3".to_string())]);
        let context = ErrorContext::new(
            RecoveryError::operation(anyhow::anyhow!("boom")),
            ErrorCategory::Model,
            ErrorSeverity::Low,
            "chat",
            1,
        )
        .with_metadata(metadata);

        assert_eq!(context.metadata["model"], "llama3");
        assert_eq!(context.message(), "boom");
    }
}
