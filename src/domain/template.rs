//! Variable-substitution templates for HTTP tools
//!
//! Templates use `{{identifier}}` placeholders only. Compilation checks every
//! placeholder against a declared variable schema; rendering substitutes
//! argument values literally. Substituted values are never re-scanned, so a
//! value containing `{{...}}` cannot expand into further placeholders.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::http_endpoint::{VariableDef, VariableKind};

/// Errors raised while compiling or rendering a template
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("Template syntax error at byte {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Missing required variable: {0}")]
    MissingRequiredVariable(String),

    #[error("Type mismatch for variable '{name}': expected {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: VariableKind,
        found: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template bound to the variables it references
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    source: String,
    segments: Vec<Segment>,
    variables: BTreeMap<String, VariableDef>,
}

impl CompiledTemplate {
    /// Parse `template` and resolve each placeholder against `schema`.
    pub fn compile(template: &str, schema: &[VariableDef]) -> Result<Self, TemplateError> {
        let segments = parse(template)?;
        let mut variables = BTreeMap::new();

        for segment in &segments {
            if let Segment::Placeholder(name) = segment {
                let def = schema
                    .iter()
                    .find(|v| &v.name == name)
                    .ok_or_else(|| TemplateError::UnknownVariable(name.clone()))?;
                variables.insert(name.clone(), def.clone());
            }
        }

        Ok(Self {
            source: template.to_string(),
            segments,
            variables,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of all variables referenced by this template
    pub fn referenced(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Referenced variables that must be supplied by the caller
    pub fn required_variables(&self) -> impl Iterator<Item = &str> {
        self.variables
            .values()
            .filter(|v| v.required && v.default.is_none())
            .map(|v| v.name.as_str())
    }

    /// Render with literal substitution.
    pub fn render(&self, arguments: &Map<String, Value>) -> Result<String, TemplateError> {
        self.render_with(arguments, |s| s.to_string())
    }

    /// Render with each substituted value percent-encoded, for URL templates.
    pub fn render_url(&self, arguments: &Map<String, Value>) -> Result<String, TemplateError> {
        self.render_with(arguments, |s| urlencoding::encode(s).into_owned())
    }

    fn render_with(
        &self,
        arguments: &Map<String, Value>,
        encode: impl Fn(&str) -> String,
    ) -> Result<String, TemplateError> {
        let mut resolved: BTreeMap<&str, String> = BTreeMap::new();
        for (name, def) in &self.variables {
            resolved.insert(name.as_str(), resolve_value(def, arguments)?);
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = resolved.get(name.as_str()) {
                        out.push_str(&encode(value));
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Extract the placeholder names used in a template, in order of appearance.
pub fn placeholders(template: &str) -> Result<Vec<String>, TemplateError> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect())
}

/// Derive a default variable schema from the placeholders used across an
/// endpoint's templates: every variable is a required string, sorted by name.
pub fn infer_variables<'a>(
    templates: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<VariableDef>, TemplateError> {
    let mut names = BTreeSet::new();
    for template in templates {
        names.extend(placeholders(template)?);
    }
    Ok(names
        .into_iter()
        .map(|name| {
            let mut def = VariableDef::new(name.clone(), VariableKind::String, true);
            def.description = Some(format!("Variable: {}", name));
            def
        })
        .collect())
}

/// Resolve the rendered text for a referenced variable.
///
/// Null arguments count as absent. An absent optional variable without a
/// default renders as the empty string.
pub(crate) fn resolve_value(
    def: &VariableDef,
    arguments: &Map<String, Value>,
) -> Result<String, TemplateError> {
    match arguments.get(&def.name) {
        Some(value) if !value.is_null() => coerce(def, value),
        _ => match &def.default {
            Some(default) => coerce(def, default),
            None if def.required => Err(TemplateError::MissingRequiredVariable(def.name.clone())),
            None => Ok(String::new()),
        },
    }
}

fn coerce(def: &VariableDef, value: &Value) -> Result<String, TemplateError> {
    let mismatch = || TemplateError::TypeMismatch {
        name: def.name.clone(),
        expected: def.kind,
        found: json_kind(value).to_string(),
    };

    match def.kind {
        VariableKind::String => match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(mismatch()),
        },
        VariableKind::Number => match value {
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => {
                let trimmed = s.trim();
                match trimmed.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(trimmed.to_string()),
                    _ => Err(mismatch()),
                }
            }
            _ => Err(mismatch()),
        },
        VariableKind::Boolean => match value {
            Value::Bool(b) => Ok(b.to_string()),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok("true".to_string()),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok("false".to_string()),
            _ => Err(mismatch()),
        },
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse(template: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        literal.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open.find("}}").ok_or_else(|| TemplateError::Syntax {
            position: offset + start,
            message: "unterminated placeholder".to_string(),
        })?;

        let inner = &after_open[..end];
        if inner.contains('{') || inner.contains('}') {
            return Err(TemplateError::Syntax {
                position: offset + start,
                message: "nested braces are not allowed".to_string(),
            });
        }

        let name = inner.trim();
        if !is_identifier(name) {
            return Err(TemplateError::Syntax {
                position: offset + start,
                message: format!("invalid placeholder name '{}'", name),
            });
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(name.to_string()));

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
