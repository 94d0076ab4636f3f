//! Anthropic Messages API provider

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;

use super::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use crate::agents::config::LlmProviderConfig;
use crate::agents::domain::{Message, Role, TokenUsage, ToolCall};
use crate::agents::error::{LlmError, LlmResult};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic LLM Provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider from configuration
    pub fn new(config: &LlmProviderConfig) -> LlmResult<Self> {
        let env_var = config.api_key_env.as_deref().unwrap_or("ANTHROPIC_API_KEY");
        let api_key = env::var(env_var).map_err(|_| {
            LlmError::Authentication(format!("Environment variable {} not set", env_var))
        })?;

        Ok(Self::with_api_key(config, api_key))
    }

    pub fn with_api_key(config: &LlmProviderConfig, api_key: impl Into<String>) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
        }
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let (system_prompt, messages) = convert_messages(&request.messages);

        let mut body = json!({
            "model": request.model.as_ref().unwrap_or(&self.model),
            "messages": messages,
            "max_tokens": request
                .max_tokens
                .or(self.default_max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if let Some(system) = system_prompt {
            body["system"] = json!(system);
        }

        if let Some(temp) = request.temperature.or(self.default_temperature) {
            body["temperature"] = json!(temp);
        }

        if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
            body["tools"] = json!(tools
                .iter()
                .map(|t| {
                    let mut schema = t.parameters.clone();
                    if !schema.is_object() {
                        schema = json!({});
                    }
                    if schema.get("type").is_none() {
                        schema["type"] = json!("object");
                    }
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": schema
                    })
                })
                .collect::<Vec<_>>());
            body["tool_choice"] = json!({ "type": "auto" });
        }

        body
    }
}

/// Convert internal messages to the Messages API format.
///
/// Returns the system prompt separately. Tool results become `tool_result`
/// blocks in a user turn; consecutive results share one turn so a batch of
/// parallel calls is answered together.
fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system_prompt: Option<String> = None;
    let mut converted: Vec<Value> = Vec::new();
    let mut pending_results: Vec<Value> = Vec::new();

    for m in messages {
        if m.role != Role::Tool && !pending_results.is_empty() {
            converted.push(json!({ "role": "user", "content": std::mem::take(&mut pending_results) }));
        }

        match m.role {
            Role::System => {
                system_prompt = Some(match system_prompt.take() {
                    Some(existing) => format!("{}\n\n{}", existing, m.content),
                    None => m.content.clone(),
                });
            }
            Role::User => {
                converted.push(json!({ "role": "user", "content": m.content }));
            }
            Role::Assistant => match &m.tool_calls {
                Some(tool_calls) => {
                    let mut content = Vec::new();
                    if !m.content.is_empty() {
                        content.push(json!({ "type": "text", "text": m.content }));
                    }
                    for tc in tool_calls {
                        // tool_use input must be an object
                        let input = if tc.arguments.is_object() {
                            tc.arguments.clone()
                        } else {
                            json!({})
                        };
                        content.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": input
                        }));
                    }
                    converted.push(json!({ "role": "assistant", "content": content }));
                }
                None => {
                    converted.push(json!({ "role": "assistant", "content": m.content }));
                }
            },
            Role::Tool => {
                pending_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": m.tool_call_id.as_deref().unwrap_or_default(),
                    "content": m.content
                }));
            }
        }
    }

    if !pending_results.is_empty() {
        converted.push(json!({ "role": "user", "content": pending_results }));
    }

    (system_prompt, converted)
}

fn parse_response(response: AnthropicResponse) -> CompletionResponse {
    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block.block_type.as_str() {
            "text" => {
                if let Some(text) = block.text {
                    content.push_str(&text);
                }
            }
            "tool_use" => {
                if let (Some(id), Some(name)) = (block.id, block.name) {
                    tool_calls.push(ToolCall::new(id, name, block.input.unwrap_or_else(|| json!({}))));
                }
            }
            _ => {}
        }
    }

    let finish_reason = match response.stop_reason.as_deref() {
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    };

    let usage = response.usage.map(|u| TokenUsage {
        prompt_tokens: u.input_tokens,
        completion_tokens: u.output_tokens,
        total_tokens: u.input_tokens + u.output_tokens,
    });

    CompletionResponse {
        message: Message::assistant_with_tools(content, tool_calls),
        finish_reason,
        usage,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::Authentication(response.text().await.unwrap_or_default()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(0);
            return Err(LlmError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {}", e)))?;

        Ok(parse_response(parsed))
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
