//! JSON Schema validation for strategy documents.
//!
//! Documents are checked against `schema/strategies.schema.json` before
//! they are deserialized, so structural mistakes are reported with a path.

use std::sync::OnceLock;

use super::table::StrategyError;

const STRATEGY_SCHEMA_JSON: &str = include_str!("../../schema/strategies.schema.json");

/// Compiled once on first use; a broken embedded schema is kept as its message.
static STRATEGY_VALIDATOR: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn strategy_validator() -> Result<&'static jsonschema::Validator, StrategyError> {
    STRATEGY_VALIDATOR
        .get_or_init(|| {
            let schema: serde_json::Value = serde_json::from_str(STRATEGY_SCHEMA_JSON)
                .map_err(|e| format!("embedded strategy schema is not JSON: {e}"))?;
            jsonschema::options()
                .build(&schema)
                .map_err(|e| format!("embedded strategy schema does not compile: {e}"))
        })
        .as_ref()
        .map_err(|reason| StrategyError::SchemaError(vec![reason.clone()]))
}

/// Validate a strategy document against the schema.
///
/// Every violation is reported as `"<message> at <path>"`.
pub fn validate_strategy_schema(document: &serde_json::Value) -> Result<(), StrategyError> {
    let violations: Vec<String> = strategy_validator()?
        .iter_errors(document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(StrategyError::SchemaError(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_document_passes() {
        let value = serde_json::json!({
            "strategies": {
                "network": { "max_retries": 3, "jitter": 0.5 },
                "unknown": { "fallback_options": ["cache"] }
            }
        });
        assert!(validate_strategy_schema(&value).is_ok());
    }

    #[test]
    fn test_empty_document_passes() {
        assert!(validate_strategy_schema(&serde_json::json!({})).is_ok());
    }

    #[test]
    fn test_unknown_field_reports_path() {
        let value = serde_json::json!({
            "strategies": { "network": { "retries": 3 } }
        });
        match validate_strategy_schema(&value) {
            Err(StrategyError::SchemaError(violations)) => {
                assert!(!violations.is_empty());
                assert!(violations.iter().any(|v| v.contains("/strategies/network")));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_jitter_fails() {
        let value = serde_json::json!({
            "strategies": { "model": { "jitter": 2.0 } }
        });
        assert!(validate_strategy_schema(&value).is_err());
    }

    #[test]
    fn test_negative_retries_fail() {
        let value = serde_json::json!({
            "strategies": { "parsing": { "max_retries": -1 } }
        });
        assert!(validate_strategy_schema(&value).is_err());
    }
}
