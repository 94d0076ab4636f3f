//! HTTP endpoint definitions used by HTTP tools

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// HTTP methods an endpoint may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared kind of a template variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    #[default]
    String,
    Number,
    Boolean,
}

impl std::fmt::Display for VariableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableKind::String => write!(f, "string"),
            VariableKind::Number => write!(f, "number"),
            VariableKind::Boolean => write!(f, "boolean"),
        }
    }
}

/// A variable an endpoint's templates may reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    #[serde(default)]
    pub kind: VariableKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableDef {
    pub fn new(name: impl Into<String>, kind: VariableKind, required: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            required,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Credentials attached to every request of an endpoint.
///
/// Credential fields are templates, validated against the endpoint's
/// variables like any other template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HttpAuthConfig {
    Bearer {
        token: String,
    },
    ApiKey {
        #[serde(default = "default_api_key_header")]
        header_name: String,
        key: String,
    },
    Basic {
        username: String,
        #[serde(default)]
        password: String,
    },
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

/// Configuration of a templated HTTP call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEndpointConfig {
    #[serde(default)]
    pub method: HttpMethod,
    pub url_template: String,
    #[serde(default)]
    pub header_templates: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<HttpAuthConfig>,
}

impl HttpEndpointConfig {
    pub fn new(method: HttpMethod, url_template: impl Into<String>) -> Self {
        Self {
            method,
            url_template: url_template.into(),
            header_templates: BTreeMap::new(),
            body_template: None,
            variables: Vec::new(),
            auth: None,
        }
    }

    pub fn with_variable(mut self, variable: VariableDef) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.header_templates.insert(name.into(), template.into());
        self
    }

    pub fn with_body(mut self, template: impl Into<String>) -> Self {
        self.body_template = Some(template.into());
        self
    }

    pub fn with_auth(mut self, auth: HttpAuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// JSON Schema describing the endpoint's variables, offered to the model
    /// as the tool's parameter schema.
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for var in &self.variables {
            let mut prop = serde_json::json!({ "type": var.kind.to_string() });
            if let Some(desc) = &var.description {
                prop["description"] = Value::String(desc.clone());
            }
            if let Some(default) = &var.default {
                prop["default"] = default.clone();
            }
            properties.insert(var.name.clone(), prop);

            if var.required && var.default.is_none() {
                required.push(Value::String(var.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
