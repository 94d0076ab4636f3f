//! Configuration types for agents

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::HttpEndpointConfig;

/// An agent: a system prompt plus the tools it may call.
///
/// Loaded read-only for each execution.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentDefinition {
    /// Unique agent id
    pub id: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// System prompt; may reference input fields with Tera syntax
    pub system_prompt: String,
    /// Callable tools, in registration order
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    /// Iteration and time budgets
    #[serde(default)]
    pub settings: ExecutionSettings,
    /// Model override for this agent (falls back to the global `llm` section)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmProviderConfig>,
}

impl AgentDefinition {
    pub fn new(id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            settings: ExecutionSettings::default(),
            llm: None,
        }
    }

    pub fn with_tool(mut self, tool: ToolDescriptor) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Budgets bounding one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecutionSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_per_call_timeout_ms")]
    pub per_call_timeout_ms: u64,
    #[serde(default = "default_total_timeout_ms")]
    pub total_timeout_ms: u64,
}

impl ExecutionSettings {
    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_millis(self.per_call_timeout_ms)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms)
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            per_call_timeout_ms: default_per_call_timeout_ms(),
            total_timeout_ms: default_total_timeout_ms(),
        }
    }
}

fn default_max_iterations() -> u32 {
    10
}

fn default_per_call_timeout_ms() -> u64 {
    30_000
}

fn default_total_timeout_ms() -> u64 {
    120_000
}

/// A tool an agent may call, tagged by backend
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDescriptor {
    /// Semantic search over a vector-knowledge collection
    VectorSearch {
        name: String,
        #[serde(default)]
        description: String,
        collection_id: String,
        #[serde(default = "default_top_k")]
        top_k: usize,
    },
    /// A tool exposed by a remote capability server
    Remote {
        /// Name offered to the model; defaults to `tool_name`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        server_id: String,
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// A templated HTTP call
    Http {
        name: String,
        #[serde(default)]
        description: String,
        endpoint: HttpEndpointConfig,
    },
}

fn default_top_k() -> usize {
    5
}

impl ToolDescriptor {
    pub fn vector_search(name: impl Into<String>, collection_id: impl Into<String>) -> Self {
        ToolDescriptor::VectorSearch {
            name: name.into(),
            description: String::new(),
            collection_id: collection_id.into(),
            top_k: default_top_k(),
        }
    }

    pub fn remote(server_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        ToolDescriptor::Remote {
            name: None,
            server_id: server_id.into(),
            tool_name: tool_name.into(),
            description: None,
        }
    }

    pub fn http(name: impl Into<String>, endpoint: HttpEndpointConfig) -> Self {
        ToolDescriptor::Http {
            name: name.into(),
            description: String::new(),
            endpoint,
        }
    }

    /// Name the model uses to request this tool
    pub fn name(&self) -> &str {
        match self {
            ToolDescriptor::VectorSearch { name, .. } => name,
            ToolDescriptor::Remote { name, tool_name, .. } => name.as_deref().unwrap_or(tool_name),
            ToolDescriptor::Http { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ToolDescriptor::VectorSearch { .. } => "vector_search",
            ToolDescriptor::Remote { .. } => "remote",
            ToolDescriptor::Http { .. } => "http",
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmProviderConfig {
    /// Provider type; inferred from the model name when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<LlmProviderType>,
    /// Model name/identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable containing the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Custom base URL (for self-hosted or proxied endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default temperature for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Default max tokens for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: default_model(),
            api_key_env: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl LlmProviderConfig {
    /// The configured provider, or the one serving `model`: `claude*`
    /// models go to Anthropic, everything else to OpenAI.
    pub fn provider_type(&self) -> LlmProviderType {
        self.provider.unwrap_or_else(|| {
            if self.model.starts_with("claude") {
                LlmProviderType::Anthropic
            } else {
                LlmProviderType::OpenAI
            }
        })
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    /// OpenAI and OpenAI-compatible chat completion endpoints
    #[default]
    #[serde(alias = "openai_compatible")]
    OpenAI,
    /// Anthropic Messages API
    Anthropic,
}

impl std::fmt::Display for LlmProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProviderType::OpenAI => write!(f, "openai"),
            LlmProviderType::Anthropic => write!(f, "anthropic"),
        }
    }
}
