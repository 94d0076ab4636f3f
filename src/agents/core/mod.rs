//! Agent execution core
//!
//! - `orchestrator`: the bounded model/tool-call loop
//! - prompt construction helpers shared by the orchestrator and the API layer

mod orchestrator;

pub use orchestrator::{ExecutionResult, Orchestrator};

use serde_json::Value;
use tera::{Context, Tera};

/// Render the system prompt as a Tera template with the input values
///
/// This allows system prompts to use template variables like:
/// ```text
/// You are a {{role}} assistant helping with {{task_type}}.
/// ```
///
/// Falls back to the original system prompt if rendering fails.
pub fn render_system_prompt(system_prompt: &str, input: &Value) -> String {
    if !system_prompt.contains("{{") && !system_prompt.contains("{%") {
        return system_prompt.to_string();
    }

    let mut context = Context::new();
    if let Some(obj) = input.as_object() {
        for (key, value) in obj {
            match value {
                Value::Null => context.insert(key, &""),
                // Nested values are exposed as their JSON text
                Value::Array(_) | Value::Object(_) => context.insert(key, &value.to_string()),
                scalar => context.insert(key, scalar),
            }
        }
    }

    match Tera::one_off(system_prompt, &context, false) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::warn!("Failed to render system prompt template: {}", e);
            system_prompt.to_string()
        }
    }
}

/// Build the first user message from the execution input.
///
/// A `message` field is used verbatim, prefixed with the JSON of a `context`
/// object when one is present. Other structured input is flattened to
/// `key: value` lines.
pub fn build_user_message(input: &Value) -> String {
    if let Value::String(text) = input {
        return text.clone();
    }

    if let Some(message) = input.get("message").and_then(|v| v.as_str()) {
        return match input.get("context").filter(|c| c.is_object()) {
            Some(context) => format!("Context: {}\n\n{}", context, message),
            None => message.to_string(),
        };
    }

    if let Some(obj) = input.as_object() {
        return obj
            .iter()
            .map(|(k, v)| {
                let value_str = match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    _ => v.to_string(),
                };
                format!("{}: {}", k, value_str)
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    match input {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
