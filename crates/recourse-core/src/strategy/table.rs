//! Per-category recovery strategies and the table that holds them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::schema::validate_strategy_schema;
use crate::types::ErrorCategory;

/// Errors that can occur when loading or validating strategies.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Failed to read strategy file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Strategy document does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Invalid strategy for '{category}': {reason}")]
    Validation {
        category: ErrorCategory,
        reason: String,
    },
}

/// Tunable retry, backoff and fallback parameters for one error category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    /// Maximum number of attempts per call
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound on the un-jittered delay, in milliseconds
    pub max_delay_ms: u64,

    /// Exponential growth factor between retries
    pub backoff_multiplier: f64,

    /// Random extra delay as a fraction of the capped delay (0.0 - 1.0)
    pub jitter: f64,

    /// Named fallback executors, tried in order
    #[serde(default)]
    pub fallback_options: Vec<String>,

    /// Whether the degrade action is permitted
    pub allow_degradation: bool,

    /// Whether a cached result may satisfy a failed call
    pub allow_cache: bool,
}

impl RecoveryStrategy {
    /// Built-in defaults for a category.
    pub fn default_for(category: ErrorCategory) -> Self {
        let (max_retries, base, max, multiplier, jitter, degrade, cache) = match category {
            ErrorCategory::Network => (5, 1000, 30_000, 2.0, 0.1, true, true),
            ErrorCategory::Model => (3, 2000, 10_000, 1.5, 0.2, true, true),
            ErrorCategory::Memory => (2, 500, 2000, 1.2, 0.1, true, false),
            ErrorCategory::RateLimit => (8, 5000, 300_000, 2.5, 0.3, false, true),
            ErrorCategory::Authentication => (1, 1000, 1000, 1.0, 0.0, false, false),
            ErrorCategory::Validation => (1, 0, 0, 1.0, 0.0, false, false),
            ErrorCategory::Parsing => (3, 500, 2000, 1.3, 0.1, true, false),
            ErrorCategory::ToolExecution => (3, 1000, 5000, 1.5, 0.2, true, false),
            ErrorCategory::Context => (2, 500, 1000, 1.2, 0.1, true, false),
            ErrorCategory::Unknown => (2, 2000, 5000, 2.0, 0.2, true, true),
        };

        let fallback_options: &[&str] = match category {
            ErrorCategory::Network | ErrorCategory::Unknown => &["cache"],
            ErrorCategory::Model => &["alternative_model", "cache"],
            ErrorCategory::Authentication
            | ErrorCategory::Validation
            | ErrorCategory::ToolExecution => &["default_values"],
            _ => &[],
        };

        Self {
            max_retries,
            base_delay_ms: base,
            max_delay_ms: max,
            backoff_multiplier: multiplier,
            jitter,
            fallback_options: fallback_options.iter().map(|s| s.to_string()).collect(),
            allow_degradation: degrade,
            allow_cache: cache,
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Return a copy with every field set in `patch` replaced.
    pub fn merged(&self, patch: &StrategyOverride) -> Self {
        Self {
            max_retries: patch.max_retries.unwrap_or(self.max_retries),
            base_delay_ms: patch.base_delay_ms.unwrap_or(self.base_delay_ms),
            max_delay_ms: patch.max_delay_ms.unwrap_or(self.max_delay_ms),
            backoff_multiplier: patch.backoff_multiplier.unwrap_or(self.backoff_multiplier),
            jitter: patch.jitter.unwrap_or(self.jitter),
            fallback_options: patch
                .fallback_options
                .clone()
                .unwrap_or_else(|| self.fallback_options.clone()),
            allow_degradation: patch.allow_degradation.unwrap_or(self.allow_degradation),
            allow_cache: patch.allow_cache.unwrap_or(self.allow_cache),
        }
    }

    /// Check numeric invariants.
    pub fn validate(&self, category: ErrorCategory) -> Result<(), StrategyError> {
        let invalid = |reason: String| StrategyError::Validation { category, reason };

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(invalid(format!("jitter {} outside 0.0..=1.0", self.jitter)));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(invalid(format!(
                "backoff_multiplier {} must be >= 1.0",
                self.backoff_multiplier
            )));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(invalid(format!(
                "max_delay_ms {} is below base_delay_ms {}",
                self.max_delay_ms, self.base_delay_ms
            )));
        }

        Ok(())
    }

    /// Bring out-of-range numeric fields back inside their invariants:
    /// jitter into `0.0..=1.0`, multiplier to at least 1.0, and the delay
    /// cap up to the base delay.
    pub fn clamped(mut self) -> Self {
        self.jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            self.backoff_multiplier = 1.0;
        }
        self.max_delay_ms = self.max_delay_ms.max(self.base_delay_ms);
        self
    }
}

/// Partial strategy, shallow-merged over a category default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_multiplier: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_options: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_degradation: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_cache: Option<bool>,
}

impl StrategyOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn delays(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.base_delay_ms = Some(base_ms);
        self.max_delay_ms = Some(max_ms);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub fn fallback_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn allow_degradation(mut self, allow: bool) -> Self {
        self.allow_degradation = Some(allow);
        self
    }

    pub fn allow_cache(mut self, allow: bool) -> Self {
        self.allow_cache = Some(allow);
        self
    }
}

/// On-disk shape of a strategy document.
#[derive(Debug, Deserialize)]
struct StrategyDocument {
    #[serde(default)]
    strategies: BTreeMap<ErrorCategory, StrategyOverride>,
}

/// Mapping from error category to its recovery strategy.
///
/// Seeded with the built-in defaults for all ten categories. Entries are
/// registered up front; [`StrategyTable::resolve`] never mutates the table.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyTable {
    strategies: BTreeMap<ErrorCategory, RecoveryStrategy>,

    /// Catch-all, kept outside the map so lookups always resolve
    unknown: RecoveryStrategy,
}

impl Default for StrategyTable {
    fn default() -> Self {
        let strategies = ErrorCategory::ALL
            .into_iter()
            .filter(|c| *c != ErrorCategory::Unknown)
            .map(|c| (c, RecoveryStrategy::default_for(c)))
            .collect();
        Self {
            strategies,
            unknown: RecoveryStrategy::default_for(ErrorCategory::Unknown),
        }
    }
}

impl StrategyTable {
    /// Table with the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the strategy for a category.
    pub fn register(
        &mut self,
        category: ErrorCategory,
        strategy: RecoveryStrategy,
    ) -> Result<(), StrategyError> {
        strategy.validate(category)?;
        if category == ErrorCategory::Unknown {
            self.unknown = strategy;
        } else {
            self.strategies.insert(category, strategy);
        }
        Ok(())
    }

    /// Strategy registered for a category.
    pub fn get(&self, category: ErrorCategory) -> &RecoveryStrategy {
        self.strategies.get(&category).unwrap_or(&self.unknown)
    }

    /// Effective strategy for one call: the category default with an
    /// optional override merged on top. Out-of-range override values are
    /// clamped, so the result always passes [`RecoveryStrategy::validate`].
    pub fn resolve(
        &self,
        category: ErrorCategory,
        patch: Option<&StrategyOverride>,
    ) -> RecoveryStrategy {
        let base = self.get(category);
        let Some(patch) = patch else {
            return base.clone();
        };

        let merged = base.merged(patch);
        match merged.validate(category) {
            Ok(()) => merged,
            Err(e) => {
                tracing::warn!(category = %category, error = %e, "Clamping invalid strategy override");
                merged.clamped()
            }
        }
    }

    /// Iterate over all registered strategies in category order.
    pub fn iter(&self) -> impl Iterator<Item = (ErrorCategory, &RecoveryStrategy)> {
        self.strategies
            .iter()
            .map(|(c, s)| (*c, s))
            .chain(std::iter::once((ErrorCategory::Unknown, &self.unknown)))
    }

    /// Load overrides from a YAML document, merged over the defaults.
    ///
    /// ```yaml
    /// strategies:
    ///   network:
    ///     max_retries: 3
    ///     fallback_options: [mirror]
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, StrategyError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Load overrides from a JSON document, merged over the defaults.
    pub fn from_json(json: &str) -> Result<Self, StrategyError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, StrategyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StrategyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn from_value(value: serde_json::Value) -> Result<Self, StrategyError> {
        validate_strategy_schema(&value)?;

        let document: StrategyDocument = serde_json::from_value(value)?;
        let mut table = Self::default();

        for (category, patch) in document.strategies {
            let merged = table.get(category).merged(&patch);
            table.register(category, merged)?;
            tracing::debug!(category = %category, "Loaded strategy override");
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let table = StrategyTable::new();

        let network = table.get(ErrorCategory::Network);
        assert_eq!(network.max_retries, 5);
        assert_eq!(network.base_delay_ms, 1000);
        assert_eq!(network.max_delay_ms, 30_000);
        assert_eq!(network.backoff_multiplier, 2.0);
        assert!(network.allow_degradation && network.allow_cache);

        let rate_limit = table.get(ErrorCategory::RateLimit);
        assert_eq!(rate_limit.max_retries, 8);
        assert_eq!(rate_limit.max_delay_ms, 300_000);
        assert!(!rate_limit.allow_degradation);

        let validation = table.get(ErrorCategory::Validation);
        assert_eq!(validation.max_retries, 1);
        assert_eq!(validation.base_delay_ms, 0);
        assert!(!validation.allow_cache);

        assert_eq!(table.iter().count(), 10);
    }

    #[test]
    fn test_all_defaults_are_valid() {
        for (category, strategy) in StrategyTable::new().iter() {
            assert!(strategy.validate(category).is_ok(), "{category} default invalid");
        }
    }

    #[test]
    fn test_override_is_shallow_and_scoped_to_call() {
        let table = StrategyTable::new();
        let patch = StrategyOverride::new().max_retries(9).fallback_options(["mirror"]);

        let resolved = table.resolve(ErrorCategory::Model, Some(&patch));
        assert_eq!(resolved.max_retries, 9);
        assert_eq!(resolved.fallback_options, vec!["mirror".to_string()]);
        assert_eq!(resolved.base_delay_ms, 2000);

        // Registry is untouched
        assert_eq!(table.get(ErrorCategory::Model).max_retries, 3);
    }

    #[test]
    fn test_resolve_clamps_invalid_override() {
        let table = StrategyTable::new();
        let patch = StrategyOverride::new()
            .backoff_multiplier(0.5)
            .jitter(2.0)
            .delays(5000, 10);

        let resolved = table.resolve(ErrorCategory::Network, Some(&patch));
        assert_eq!(resolved.backoff_multiplier, 1.0);
        assert_eq!(resolved.jitter, 1.0);
        assert_eq!(resolved.base_delay_ms, 5000);
        assert_eq!(resolved.max_delay_ms, 5000);
        assert!(resolved.validate(ErrorCategory::Network).is_ok());

        // Delays no longer shrink between attempts
        let second = crate::backoff::capped_delay(&resolved, 2);
        let third = crate::backoff::capped_delay(&resolved, 3);
        assert!(third >= second);
    }

    #[test]
    fn test_resolve_keeps_valid_override_untouched() {
        let table = StrategyTable::new();
        let patch = StrategyOverride::new().backoff_multiplier(3.0).jitter(0.0);
        let resolved = table.resolve(ErrorCategory::Model, Some(&patch));
        assert_eq!(resolved.backoff_multiplier, 3.0);
        assert_eq!(resolved.jitter, 0.0);
    }

    #[test]
    fn test_clamped_handles_non_finite_values() {
        let mut strategy = RecoveryStrategy::default_for(ErrorCategory::Parsing);
        strategy.jitter = f64::NAN;
        strategy.backoff_multiplier = f64::INFINITY;

        let strategy = strategy.clamped();
        assert_eq!(strategy.jitter, 0.0);
        assert_eq!(strategy.backoff_multiplier, 1.0);
    }

    #[test]
    fn test_register_rejects_bad_jitter() {
        let mut table = StrategyTable::new();
        let mut strategy = RecoveryStrategy::default_for(ErrorCategory::Network);
        strategy.jitter = 1.5;

        let result = table.register(ErrorCategory::Network, strategy);
        assert!(matches!(result, Err(StrategyError::Validation { .. })));
    }

    #[test]
    fn test_from_yaml_merges_over_defaults() {
        let yaml = r#"
strategies:
  network:
    max_retries: 2
    fallback_options: [mirror, cache]
  parsing:
    allow_cache: true
"#;
        let table = StrategyTable::from_yaml(yaml).unwrap();

        let network = table.get(ErrorCategory::Network);
        assert_eq!(network.max_retries, 2);
        assert_eq!(network.base_delay_ms, 1000);
        assert_eq!(network.fallback_options, vec!["mirror", "cache"]);

        assert!(table.get(ErrorCategory::Parsing).allow_cache);
        assert_eq!(table.get(ErrorCategory::Memory).max_retries, 2);
    }

    #[test]
    fn test_from_json_rejects_unknown_category() {
        let json = r#"{ "strategies": { "cosmic_rays": { "max_retries": 1 } } }"#;
        let result = StrategyTable::from_json(json);
        assert!(matches!(result, Err(StrategyError::SchemaError(_))));
    }

    #[test]
    fn test_from_yaml_rejects_inverted_delays() {
        let yaml = r#"
strategies:
  model:
    base_delay_ms: 5000
    max_delay_ms: 10
"#;
        let result = StrategyTable::from_yaml(yaml);
        assert!(matches!(
            result,
            Err(StrategyError::Validation { category: ErrorCategory::Model, .. })
        ));
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let table = StrategyTable::from_yaml("strategies: {}").unwrap();
        assert_eq!(table, StrategyTable::new());
    }
}
