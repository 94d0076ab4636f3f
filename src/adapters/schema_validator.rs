//! Shape validation of tool arguments against a tool's JSON input schema.
//!
//! Covers the subset of JSON Schema remote servers advertise for tool inputs:
//! top-level `type`, `required`, and per-property `type` (string or list of
//! strings). Unknown keywords are ignored.

use serde_json::Value;

/// Validate `arguments` against `schema`, collecting every violation.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    check_node(schema, arguments, "arguments", &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_node(schema: &Value, value: &Value, path: &str, errors: &mut Vec<String>) {
    if let Some(declared) = schema.get("type") {
        if !type_matches(declared, value) {
            errors.push(format!(
                "{path}: expected {}, got {}",
                describe_type(declared),
                crate::domain::template::json_kind(value)
            ));
            return;
        }
    }

    let Some(object) = value.as_object() else {
        return;
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !object.contains_key(key) {
                errors.push(format!("{path}: missing required property \"{key}\""));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, prop_schema) in properties {
            if let Some(prop_value) = object.get(key) {
                check_node(prop_schema, prop_value, &format!("{path}.{key}"), errors);
            }
        }
    }
}

fn type_matches(declared: &Value, value: &Value) -> bool {
    match declared {
        Value::String(t) => single_type_matches(t, value),
        Value::Array(types) => types
            .iter()
            .filter_map(|t| t.as_str())
            .any(|t| single_type_matches(t, value)),
        _ => true,
    }
}

fn single_type_matches(declared: &str, value: &Value) -> bool {
    match declared {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        _ => true,
    }
}

fn describe_type(declared: &Value) -> String {
    match declared {
        Value::String(t) => t.clone(),
        Value::Array(types) => types
            .iter()
            .filter_map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" | "),
        other => other.to_string(),
    }
}
