//! HTTP Tool Executor
//!
//! Builds a single HTTP call from an endpoint's compiled templates and the
//! arguments supplied by the model. Rendering failures abort before any
//! network activity. No retries happen at this layer.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::domain::template::{resolve_value, CompiledTemplate, TemplateError};
use crate::domain::{HttpAuthConfig, HttpEndpointConfig, HttpMethod};

#[derive(Debug, Error)]
pub enum HttpToolError {
    #[error("Validation error: {0}")]
    Validation(#[from] TemplateError),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {code}")]
    HttpStatus { code: u16, body: Value },

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Outcome of a successful HTTP tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpToolResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Text(String),
}

/// A fully rendered request, ready to send
#[derive(Debug, Clone)]
pub struct RenderedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub basic_auth: Option<(String, String)>,
}

#[derive(Debug, Clone)]
enum CompiledAuth {
    Bearer(CompiledTemplate),
    ApiKey {
        header_name: String,
        key: CompiledTemplate,
    },
    Basic {
        username: CompiledTemplate,
        password: CompiledTemplate,
    },
}

/// An endpoint whose templates have been validated against its variables.
///
/// Compiled once per registry and reused for every call to the endpoint.
#[derive(Debug, Clone)]
pub struct CompiledEndpoint {
    config: HttpEndpointConfig,
    url: CompiledTemplate,
    headers: Vec<(String, CompiledTemplate)>,
    body: Option<CompiledTemplate>,
    auth: Option<CompiledAuth>,
}

impl CompiledEndpoint {
    pub fn compile(config: HttpEndpointConfig) -> Result<Self, TemplateError> {
        let vars = &config.variables;
        let url = CompiledTemplate::compile(&config.url_template, vars)?;

        let headers = config
            .header_templates
            .iter()
            .map(|(name, template)| Ok((name.clone(), CompiledTemplate::compile(template, vars)?)))
            .collect::<Result<Vec<_>, TemplateError>>()?;

        let body = config
            .body_template
            .as_deref()
            .map(|t| CompiledTemplate::compile(t, vars))
            .transpose()?;

        let auth = match &config.auth {
            None => None,
            Some(HttpAuthConfig::Bearer { token }) => {
                Some(CompiledAuth::Bearer(CompiledTemplate::compile(token, vars)?))
            }
            Some(HttpAuthConfig::ApiKey { header_name, key }) => Some(CompiledAuth::ApiKey {
                header_name: header_name.clone(),
                key: CompiledTemplate::compile(key, vars)?,
            }),
            Some(HttpAuthConfig::Basic { username, password }) => Some(CompiledAuth::Basic {
                username: CompiledTemplate::compile(username, vars)?,
                password: CompiledTemplate::compile(password, vars)?,
            }),
        };

        Ok(Self {
            config,
            url,
            headers,
            body,
            auth,
        })
    }

    pub fn config(&self) -> &HttpEndpointConfig {
        &self.config
    }

    /// Render every template of the endpoint.
    ///
    /// All required declared variables must be present, even those no
    /// template references.
    pub fn render(&self, arguments: &Map<String, Value>) -> Result<RenderedRequest, TemplateError> {
        for var in &self.config.variables {
            if var.required {
                resolve_value(var, arguments)?;
            }
        }

        let url = self.url.render_url(arguments)?;

        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        for (name, template) in &self.headers {
            headers.push((name.clone(), template.render(arguments)?));
        }

        let mut basic_auth = None;
        match &self.auth {
            Some(CompiledAuth::Bearer(token)) => {
                headers.push((
                    "Authorization".to_string(),
                    format!("Bearer {}", token.render(arguments)?),
                ));
            }
            Some(CompiledAuth::ApiKey { header_name, key }) => {
                headers.push((header_name.clone(), key.render(arguments)?));
            }
            Some(CompiledAuth::Basic { username, password }) => {
                basic_auth = Some((username.render(arguments)?, password.render(arguments)?));
            }
            None => {}
        }

        let body = match &self.body {
            Some(template) => {
                let text = template.render(arguments)?;
                Some(match serde_json::from_str::<Value>(&text) {
                    Ok(value) => RequestBody::Json(value),
                    Err(_) => RequestBody::Text(text),
                })
            }
            None => None,
        };

        Ok(RenderedRequest {
            method: self.config.method,
            url,
            headers,
            body,
            basic_auth,
        })
    }
}

/// Issues templated HTTP calls
#[derive(Clone, Default)]
pub struct HttpToolExecutor {
    client: Client,
}

impl HttpToolExecutor {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Render and issue one request for `endpoint`.
    pub async fn execute(
        &self,
        endpoint: &CompiledEndpoint,
        arguments: &Value,
        timeout: Duration,
    ) -> Result<HttpToolResponse, HttpToolError> {
        let arguments = as_argument_map(arguments)?;
        let rendered = endpoint.render(&arguments)?;
        self.send(rendered, timeout).await
    }

    /// Compile and execute an endpoint configuration ad hoc.
    pub async fn test_endpoint(
        &self,
        config: HttpEndpointConfig,
        arguments: &Value,
        timeout: Duration,
    ) -> Result<HttpToolResponse, HttpToolError> {
        let endpoint = CompiledEndpoint::compile(config)?;
        self.execute(&endpoint, arguments, timeout).await
    }

    async fn send(
        &self,
        rendered: RenderedRequest,
        timeout: Duration,
    ) -> Result<HttpToolResponse, HttpToolError> {
        let url = reqwest::Url::parse(&rendered.url)
            .map_err(|e| HttpToolError::InvalidRequest(format!("invalid URL '{}': {}", rendered.url, e)))?;

        debug!(method = %rendered.method, host = url.host_str().unwrap_or(""), "Executing HTTP tool");

        let mut request = self
            .client
            .request(to_reqwest_method(rendered.method), url)
            .timeout(timeout);

        for (name, value) in &rendered.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some((username, password)) = &rendered.basic_auth {
            request = request.basic_auth(username, Some(password));
        }

        request = match rendered.body {
            Some(RequestBody::Json(value)) => request.json(&value),
            Some(RequestBody::Text(text)) => request.body(text),
            None => request,
        };

        let response = request.send().await.map_err(|e| classify(e, timeout))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let text = response.text().await.map_err(|e| classify(e, timeout))?;
        let body = parse_body(&text);

        if !(status.is_success() || status.is_redirection()) {
            return Err(HttpToolError::HttpStatus {
                code: status.as_u16(),
                body,
            });
        }

        Ok(HttpToolResponse {
            status_code: status.as_u16(),
            headers,
            body,
        })
    }
}

fn as_argument_map(arguments: &Value) -> Result<Map<String, Value>, HttpToolError> {
    match arguments {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        other => Err(HttpToolError::InvalidArguments(format!(
            "expected an object, got {}",
            crate::domain::template::json_kind(other)
        ))),
    }
}

fn parse_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "text": text }))
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> HttpToolError {
    if err.is_timeout() {
        HttpToolError::Timeout(timeout)
    } else if err.is_builder() {
        HttpToolError::InvalidRequest(err.to_string())
    } else {
        HttpToolError::Network(err.to_string())
    }
}
