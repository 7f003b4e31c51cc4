//! Structural checks of call arguments against a capability's declared schema.
//!
//! Only the subset of JSON schema our capabilities declare is enforced:
//! `required`, per-property `type` (single or list) and `enum`. Properties
//! that are not declared pass through untouched.
use serde_json::{Map, Value};

use crate::errors::{AgentError, AgentResult};

pub fn validate_arguments(schema: &Value, arguments: &Value) -> AgentResult<()> {
    let arguments = arguments.as_object().ok_or_else(|| {
        AgentError::InvalidParameters("arguments must be a JSON object".to_string())
    })?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if arguments.get(key).map_or(true, Value::is_null) {
                return Err(AgentError::InvalidParameters(format!(
                    "missing required parameter '{}'",
                    key
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        check_properties(properties, arguments)?;
    }

    Ok(())
}

fn check_properties(
    properties: &Map<String, Value>,
    arguments: &Map<String, Value>,
) -> AgentResult<()> {
    for (key, value) in arguments {
        // optional parameters may be sent as explicit nulls
        if value.is_null() {
            continue;
        }
        let Some(declared) = properties.get(key) else {
            continue;
        };

        if let Some(expected) = declared.get("type") {
            let matches = match expected {
                Value::String(name) => matches_type(name, value),
                Value::Array(names) => names
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|name| matches_type(name, value)),
                _ => true,
            };
            if !matches {
                return Err(AgentError::InvalidParameters(format!(
                    "parameter '{}' must be of type {}",
                    key, expected
                )));
            }
        }

        if let Some(allowed) = declared.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(AgentError::InvalidParameters(format!(
                    "parameter '{}' must be one of {}",
                    key,
                    Value::Array(allowed.clone())
                )));
            }
        }
    }
    Ok(())
}

fn matches_type(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["filepath"],
            "properties": {
                "filepath": {"type": "string"},
                "limit": {"type": "integer"},
                "mode": {"enum": ["fast", "full"]},
                "tags": {"type": ["array", "string"]}
            }
        })
    }

    #[test]
    fn test_valid_arguments() {
        let args = json!({"filepath": "src/lib.rs", "limit": 10, "mode": "fast", "extra": true});
        assert!(validate_arguments(&schema(), &args).is_ok());
    }

    #[test]
    fn test_missing_required() {
        let err = validate_arguments(&schema(), &json!({"limit": 1})).unwrap_err();
        assert_eq!(
            err,
            AgentError::InvalidParameters("missing required parameter 'filepath'".into())
        );

        let err = validate_arguments(&schema(), &json!({"filepath": null})).unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));
    }

    #[test]
    fn test_wrong_type() {
        let err = validate_arguments(&schema(), &json!({"filepath": 3})).unwrap_err();
        assert!(err.to_string().contains("'filepath' must be of type"));

        let err = validate_arguments(&schema(), &json!({"filepath": "a", "limit": 1.5}))
            .unwrap_err();
        assert!(err.to_string().contains("'limit'"));
    }

    #[test]
    fn test_type_lists_and_enums() {
        assert!(validate_arguments(&schema(), &json!({"filepath": "a", "tags": "x"})).is_ok());
        assert!(validate_arguments(&schema(), &json!({"filepath": "a", "tags": ["x"]})).is_ok());
        assert!(validate_arguments(&schema(), &json!({"filepath": "a", "tags": 1})).is_err());
        assert!(validate_arguments(&schema(), &json!({"filepath": "a", "mode": "slow"})).is_err());
    }

    #[test]
    fn test_non_object_arguments() {
        assert!(validate_arguments(&schema(), &json!(["src/lib.rs"])).is_err());
        assert!(validate_arguments(&json!({}), &json!("x")).is_err());
    }
}
