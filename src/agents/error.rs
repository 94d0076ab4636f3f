//! Error types for agent execution

use std::time::Duration;
use thiserror::Error;

use crate::adapters::http_executor::HttpToolError;
use crate::adapters::mcp_client::RemoteError;
use crate::domain::{TemplateError, VectorSearchError};

/// Errors that can occur during agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent not found
    #[error("Agent not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool registry could not be built
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors specific to LLM provider operations
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// API error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Timeout
    #[error("Request timed out")]
    Timeout,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_connect() {
            LlmError::Network(format!("Connection error: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

/// Errors raised while binding an agent's tools
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is registered more than once")]
    DuplicateTool(String),

    #[error("Tool '{tool}' references unknown remote server '{server_id}'")]
    UnknownServer { tool: String, server_id: String },

    #[error("Tool '{tool}' requires a {collaborator} but none is configured")]
    MissingCollaborator {
        tool: String,
        collaborator: &'static str,
    },

    #[error("Tool '{tool}' has an invalid endpoint: {source}")]
    InvalidEndpoint {
        tool: String,
        #[source]
        source: TemplateError,
    },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

/// Failure of a single tool call
#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Http(#[from] HttpToolError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    VectorSearch(#[from] VectorSearchError),

    /// The call outlived its deadline. `budget_exhausted` is set when the
    /// deadline was the execution's total budget rather than the per-call limit.
    #[error("Tool call timed out after {}ms", .elapsed.as_millis())]
    Timeout {
        elapsed: Duration,
        budget_exhausted: bool,
    },
}

impl ToolCallError {
    /// Whether this failure must end the whole execution.
    ///
    /// Rejected credentials and failed handshakes mean the remote server is
    /// unusable for the rest of the run; a timeout that consumed the last of
    /// the total budget leaves no time to continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            ToolCallError::Remote(RemoteError::Auth(_))
            | ToolCallError::Remote(RemoteError::HandshakeFailed(_)) => true,
            ToolCallError::Timeout {
                budget_exhausted, ..
            } => *budget_exhausted,
            _ => false,
        }
    }

    /// Short machine-readable classification, surfaced to the model and the trace
    pub fn kind(&self) -> &'static str {
        match self {
            ToolCallError::ToolNotFound(_) => "tool_not_found",
            ToolCallError::InvalidArguments(_) => "validation",
            ToolCallError::Http(e) => match e {
                HttpToolError::Validation(_)
                | HttpToolError::InvalidArguments(_)
                | HttpToolError::InvalidRequest(_) => "validation",
                HttpToolError::Network(_) => "network",
                HttpToolError::HttpStatus { .. } => "http_status",
                HttpToolError::Timeout(_) => "timeout",
            },
            ToolCallError::Remote(e) => match e {
                RemoteError::Auth(_) => "auth",
                RemoteError::HandshakeFailed(_)
                | RemoteError::Connection(_)
                | RemoteError::Protocol(_) => "connection",
                RemoteError::ToolNotFound(_) => "tool_not_found",
                RemoteError::Validation(_) => "validation",
                RemoteError::Timeout(_) => "timeout",
                RemoteError::Tool(_) => "tool_error",
            },
            ToolCallError::VectorSearch(_) => "vector_search",
            ToolCallError::Timeout { .. } => "timeout",
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization(err.to_string())
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;
