//! OpenAI-compatible chat completions provider

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;

use super::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use crate::agents::config::LlmProviderConfig;
use crate::agents::domain::{Message, Role, TokenUsage, ToolCall};
use crate::agents::error::{LlmError, LlmResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI LLM Provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider from configuration
    pub fn new(config: &LlmProviderConfig) -> LlmResult<Self> {
        let env_var = config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
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

    /// Build the request body for the chat completions API
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model.as_ref().unwrap_or(&self.model),
            "messages": convert_messages(&request.messages),
        });

        if let Some(temp) = request.temperature.or(self.default_temperature) {
            body["temperature"] = json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens.or(self.default_max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
            body["tools"] = json!(tools
                .iter()
                .map(|t| {
                    // Function parameters must be an object schema
                    let mut params = t.parameters.clone();
                    if !params.is_object() {
                        params = json!({});
                    }
                    if params.get("type").is_none() {
                        params["type"] = json!("object");
                    }
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": params
                        }
                    })
                })
                .collect::<Vec<_>>());
            body["tool_choice"] = json!("auto");
        }

        body
    }
}

/// Convert internal messages to the wire format
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = json!({
                "role": match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                },
                "content": m.content,
            });

            if let Some(tool_calls) = &m.tool_calls {
                msg["tool_calls"] = json!(tool_calls
                    .iter()
                    .map(|tc| {
                        let arguments = match &tc.arguments {
                            Value::String(raw) => raw.clone(),
                            other => other.to_string(),
                        };
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": { "name": tc.name, "arguments": arguments }
                        })
                    })
                    .collect::<Vec<_>>());
            }

            if let Some(tool_call_id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(tool_call_id);
            }

            msg
        })
        .collect()
}

/// Parse a completion response.
///
/// Tool-call arguments that are not valid JSON are kept as the raw string so
/// the orchestrator can report them back to the model.
fn parse_response(response: OpenAiResponse) -> LlmResult<CompletionResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Parse("No choices in response".to_string()))?;

    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let arguments = if tc.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(Value::String(tc.function.arguments))
            };
            ToolCall::new(tc.id, tc.function.name, arguments)
        })
        .collect();

    let content = choice.message.content.unwrap_or_default();
    let message = Message::assistant_with_tools(content, tool_calls);

    let finish_reason = match choice.finish_reason.as_deref() {
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    let usage = response.usage.map(|u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(CompletionResponse {
        message,
        finish_reason,
        usage,
    })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {}", e)))?;

        parse_response(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::ToolDefinition;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::with_api_key(&LlmProviderConfig::default(), "sk-test")
    }

    #[test]
    fn test_request_body_includes_tools() {
        let request = CompletionRequest {
            messages: vec![Message::system("Be brief."), Message::user("hi")],
            tools: Some(vec![ToolDefinition::new("lookup", "Look up", json!({}))]),
            ..Default::default()
        };

        let body = provider().build_request_body(&request);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_tool_round_trip_messages() {
        let call = ToolCall::new("call_1", "lookup", json!({ "id": 4 }));
        let messages = vec![
            Message::assistant_with_tools("", vec![call]),
            Message::tool_result("call_1", &json!({ "ok": true })),
        ];

        let wire = convert_messages(&messages);

        assert_eq!(wire[0]["tool_calls"][0]["function"]["arguments"], "{\"id\":4}");
        assert_eq!(wire[1]["tool_call_id"], "call_1");
        assert_eq!(wire[1]["content"], "{\"ok\":true}");
    }

    #[test]
    fn test_parse_tool_calls_keeps_malformed_arguments() {
        let response: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        { "id": "a", "function": { "name": "one", "arguments": "{\"q\":\"x\"}" } },
                        { "id": "b", "function": { "name": "two", "arguments": "{not json" } }
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        }))
        .unwrap();

        let parsed = parse_response(response).unwrap();

        assert_eq!(parsed.finish_reason, FinishReason::ToolCalls);
        assert_eq!(parsed.requested_calls().len(), 2);
        assert_eq!(parsed.requested_calls()[0].arguments, json!({ "q": "x" }));
        assert_eq!(parsed.requested_calls()[1].arguments, json!("{not json"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }
}
