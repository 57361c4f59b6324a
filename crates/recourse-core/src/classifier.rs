//! Error classifier: assigns a severity to a failure.
//!
//! Rules are evaluated in order and the first match wins:
//! 1. "out of memory" / "fatal", or the memory category -> critical
//! 2. "authentication" / "unauthorized" / "forbidden", or the
//!    authentication category -> high
//! 3. "timeout" / "connection" / "rate limit", or the network and
//!    rate_limit categories -> medium
//! 4. everything else -> low
//!
//! Matching is case-insensitive. Classification is pure and never fails.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{ErrorCategory, ErrorSeverity};

lazy_static! {
    static ref CRITICAL_PATTERN: Regex = Regex::new(r"(?i)out of memory|fatal").unwrap();

    static ref HIGH_PATTERN: Regex =
        Regex::new(r"(?i)authentication|unauthorized|forbidden").unwrap();

    static ref MEDIUM_PATTERN: Regex = Regex::new(r"(?i)timeout|connection|rate limit").unwrap();
}

/// Classify a failure message within a category.
pub fn classify(message: &str, category: ErrorCategory) -> ErrorSeverity {
    if CRITICAL_PATTERN.is_match(message) || category == ErrorCategory::Memory {
        return ErrorSeverity::Critical;
    }

    if HIGH_PATTERN.is_match(message) || category == ErrorCategory::Authentication {
        return ErrorSeverity::High;
    }

    if MEDIUM_PATTERN.is_match(message)
        || matches!(category, ErrorCategory::Network | ErrorCategory::RateLimit)
    {
        return ErrorSeverity::Medium;
    }

    ErrorSeverity::Low
}

/// Object form of [`classify`], for callers that hold a classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify any displayable error.
    pub fn classify<E: std::fmt::Display + ?Sized>(
        &self,
        error: &E,
        category: ErrorCategory,
    ) -> ErrorSeverity {
        classify(&error.to_string(), category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_memory_is_critical() {
        assert_eq!(
            classify("CUDA error: out of memory", ErrorCategory::Model),
            ErrorSeverity::Critical
        );
        assert_eq!(
            classify("FATAL: worker crashed", ErrorCategory::Unknown),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_memory_category_is_critical() {
        assert_eq!(classify("allocation failed", ErrorCategory::Memory), ErrorSeverity::Critical);
    }

    #[test]
    fn test_auth_messages_are_high() {
        assert_eq!(classify("401 Unauthorized", ErrorCategory::Unknown), ErrorSeverity::High);
        assert_eq!(classify("forbidden", ErrorCategory::Network), ErrorSeverity::High);
        assert_eq!(classify("bad key", ErrorCategory::Authentication), ErrorSeverity::High);
    }

    #[test]
    fn test_transient_messages_are_medium() {
        assert_eq!(classify("Connection reset", ErrorCategory::Parsing), ErrorSeverity::Medium);
        assert_eq!(classify("request timeout", ErrorCategory::Unknown), ErrorSeverity::Medium);
        assert_eq!(classify("Rate limit hit", ErrorCategory::Unknown), ErrorSeverity::Medium);
        assert_eq!(classify("anything", ErrorCategory::Network), ErrorSeverity::Medium);
        assert_eq!(classify("anything", ErrorCategory::RateLimit), ErrorSeverity::Medium);
    }

    #[test]
    fn test_everything_else_is_low() {
        assert_eq!(classify("unexpected token", ErrorCategory::Parsing), ErrorSeverity::Low);
        assert_eq!(classify("", ErrorCategory::Unknown), ErrorSeverity::Low);
    }

    #[test]
    fn test_first_match_wins() {
        // Critical keywords beat the authentication category
        assert_eq!(
            classify("fatal: token store corrupted", ErrorCategory::Authentication),
            ErrorSeverity::Critical
        );
        // Auth keywords beat the network category
        assert_eq!(
            classify("connection closed: unauthorized", ErrorCategory::Network),
            ErrorSeverity::High
        );
    }

    #[test]
    fn test_classifier_object_accepts_errors() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "connection timeout");
        assert_eq!(
            ErrorClassifier::new().classify(&err, ErrorCategory::Unknown),
            ErrorSeverity::Medium
        );
    }
}
