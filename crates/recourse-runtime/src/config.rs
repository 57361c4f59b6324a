//! Runtime configuration.
//!
//! Durations are written in human form (`"60s"`, `"500ms"`).
//!
//! ```yaml
//! circuit_breaker:
//!   failure_threshold: 5
//!   recovery_timeout: 60s
//!   success_threshold: 3
//! history_capacity: 1000
//! degradation:
//!   step: 0.1
//!   heavy_threshold: 0.5
//!   heavy_delay: 2s
//!   light_delay: 500ms
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::resilience::CircuitBreakerConfig;

/// Default number of error records kept in history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Configuration for the recovery runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Thresholds for every per-operation circuit breaker
    pub circuit_breaker: CircuitBreakerConfig,

    /// Maximum error records kept (oldest evicted first)
    pub history_capacity: usize,

    /// Shared throttle settings
    pub degradation: DegradationConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            degradation: DegradationConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.circuit_breaker.success_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.success_threshold must be at least 1".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if !(self.degradation.step > 0.0 && self.degradation.step <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "degradation.step {} outside (0.0, 1.0]",
                self.degradation.step
            )));
        }
        if !(0.0..=1.0).contains(&self.degradation.heavy_threshold) {
            return Err(ConfigError::Invalid(format!(
                "degradation.heavy_threshold {} outside 0.0..=1.0",
                self.degradation.heavy_threshold
            )));
        }
        Ok(())
    }
}

/// How the shared degradation level throttles attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationConfig {
    /// Increase applied by each degrade action
    pub step: f64,

    /// Level above which the heavy delay applies
    pub heavy_threshold: f64,

    /// Delay at level 1.0 when above the threshold, scaled by level
    #[serde(with = "humantime_duration")]
    pub heavy_delay: Duration,

    /// Delay at level 1.0 when at or below the threshold, scaled by level
    #[serde(with = "humantime_duration")]
    pub light_delay: Duration,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            step: 0.1,
            heavy_threshold: 0.5,
            heavy_delay: Duration::from_millis(2000),
            light_delay: Duration::from_millis(500),
        }
    }
}

impl DegradationConfig {
    /// Pre-attempt throttle for a degradation level.
    pub fn delay_for(&self, level: f64) -> Duration {
        if level <= 0.0 {
            return Duration::ZERO;
        }
        let level = level.min(1.0);
        if level > self.heavy_threshold {
            self.heavy_delay.mul_f64(level)
        } else {
            self.light_delay.mul_f64(level)
        }
    }
}

/// Serde adapter writing durations as `"1m 30s"`-style strings.
pub(crate) mod humantime_duration {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.history_capacity, 1000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(60));
        assert_eq!(config.circuit_breaker.success_threshold, 3);
        assert_eq!(config.degradation.step, 0.1);
    }

    #[test]
    fn test_from_yaml_with_human_durations() {
        let yaml = r#"
circuit_breaker:
  failure_threshold: 2
  recovery_timeout: 1m 30s
history_capacity: 50
degradation:
  heavy_delay: 3s
  light_delay: 250ms
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(90));
        assert_eq!(config.circuit_breaker.success_threshold, 3);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.degradation.heavy_delay, Duration::from_secs(3));
        assert_eq!(config.degradation.light_delay, Duration::from_millis(250));
        assert_eq!(config.degradation.step, 0.1);
    }

    #[test]
    fn test_json_round_trip() {
        let config = RuntimeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"1m\""));
        assert_eq!(RuntimeConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let yaml = "circuit_breaker:\n  failure_threshold: 0\n";
        assert!(matches!(
            RuntimeConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_bad_duration() {
        let yaml = "circuit_breaker:\n  recovery_timeout: soon\n";
        assert!(matches!(
            RuntimeConfig::from_yaml(yaml),
            Err(ConfigError::YamlError(_))
        ));
    }

    #[test]
    fn test_degradation_delay_scales_with_level() {
        let degradation = DegradationConfig::default();
        assert_eq!(degradation.delay_for(0.0), Duration::ZERO);
        assert_eq!(degradation.delay_for(0.5), Duration::from_millis(250));
        assert_eq!(degradation.delay_for(1.0), Duration::from_millis(2000));
        assert!(degradation.delay_for(0.6) > degradation.delay_for(0.5));
    }
}
