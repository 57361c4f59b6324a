//! Shared vocabulary: error categories, severities and recovery actions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a failure. Each category carries its own retry economics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Model,
    Memory,
    Validation,
    Authentication,
    RateLimit,
    Parsing,
    ToolExecution,
    Context,
    Unknown,
}

impl ErrorCategory {
    /// All categories, in declaration order.
    pub const ALL: [ErrorCategory; 10] = [
        ErrorCategory::Network,
        ErrorCategory::Model,
        ErrorCategory::Memory,
        ErrorCategory::Validation,
        ErrorCategory::Authentication,
        ErrorCategory::RateLimit,
        ErrorCategory::Parsing,
        ErrorCategory::ToolExecution,
        ErrorCategory::Context,
        ErrorCategory::Unknown,
    ];

    /// Stable snake_case name, as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Model => "model",
            ErrorCategory::Memory => "memory",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Parsing => "parsing",
            ErrorCategory::ToolExecution => "tool_execution",
            ErrorCategory::Context => "context",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Parse a category name, mapping anything unrecognized to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or(ErrorCategory::Unknown)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a category name is not one of the ten known names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for ErrorCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// How urgently a failure needs attention, independent of its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// What the orchestrator does in response to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Wait out a backoff delay and try again
    Retry,

    /// Try the strategy's named fallback executors in order
    Fallback,

    /// Raise the shared degradation level, then retry
    Degrade,

    /// Serve a previously cached result
    Cache,

    /// Give up on this call without further attempts
    Skip,

    /// Stop retrying
    Abort,

    /// Stop retrying and surface the failure for human attention
    Escalate,
}

impl RecoveryAction {
    /// Whether this action ends the retry loop unconditionally.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecoveryAction::Skip | RecoveryAction::Abort | RecoveryAction::Escalate
        )
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecoveryAction::Retry => "retry",
            RecoveryAction::Fallback => "fallback",
            RecoveryAction::Degrade => "degrade",
            RecoveryAction::Cache => "cache",
            RecoveryAction::Skip => "skip",
            RecoveryAction::Abort => "abort",
            RecoveryAction::Escalate => "escalate",
        };
        f.write_str(s)
    }
}
