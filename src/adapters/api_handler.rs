//! REST API handlers
//!
//! Thin boundary over [`AgentHandler`]: agent listing and execution, remote
//! server inspection and ad hoc HTTP tool testing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::http_executor::HttpToolError;
use crate::agents::error::AgentError;
use crate::agents::handler::AgentHandler;
use crate::domain::template::infer_variables;
use crate::domain::HttpEndpointConfig;

const DEFAULT_TEST_TIMEOUT_MS: u64 = 30_000;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub agents: Arc<AgentHandler>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Serialize)]
pub struct RemoteServerInfo {
    pub id: String,
    pub state: String,
}

#[derive(Deserialize)]
pub struct HttpToolTestRequest {
    pub endpoint: HttpEndpointConfig,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
pub struct InferVariablesRequest {
    pub endpoint: HttpEndpointConfig,
}

fn agent_error_status(error: &AgentError) -> StatusCode {
    match error {
        AgentError::NotFound(_) => StatusCode::NOT_FOUND,
        AgentError::Registry(_) | AgentError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AgentError::Llm(_) => StatusCode::BAD_GATEWAY,
        AgentError::Serialization(_) | AgentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Agents
// ============================================================================

pub async fn list_agents(State(state): State<ApiState>) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(state.agents.list_agents())))
}

pub async fn get_agent(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.agents.get_agent(&id) {
        Some(agent) => (StatusCode::OK, Json(ApiResponse::success(agent.clone()))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Agent not found: {}", id))),
        ),
    }
}

/// Run an agent to a terminal status.
///
/// Every terminal status, including failed and timed-out runs, is a 200 with
/// the execution payload; only executions that never start are errors.
pub async fn execute_agent(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(input): Json<Value>,
) -> Response {
    match state.agents.execute(&id, input).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            tracing::warn!(agent = %id, error = %e, "Execution could not start");
            (agent_error_status(&e), Json(ApiResponse::<()>::error(e.to_string()))).into_response()
        }
    }
}

// ============================================================================
// Remote servers
// ============================================================================

pub async fn list_remote_servers(State(state): State<ApiState>) -> impl IntoResponse {
    let servers: Vec<RemoteServerInfo> = state
        .agents
        .tools()
        .remote
        .states()
        .into_iter()
        .map(|(id, state)| RemoteServerInfo {
            id,
            state: state.to_string(),
        })
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(servers)))
}

pub async fn list_remote_tools(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.agents.remote_tools(&id).await {
        Ok(tools) => (StatusCode::OK, Json(ApiResponse::success(tools))),
        Err(e) => (agent_error_status(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

// ============================================================================
// HTTP tools
// ============================================================================

pub async fn test_http_tool(
    State(state): State<ApiState>,
    Json(request): Json<HttpToolTestRequest>,
) -> impl IntoResponse {
    let timeout = Duration::from_millis(request.timeout_ms.unwrap_or(DEFAULT_TEST_TIMEOUT_MS));
    let result = state
        .agents
        .tools()
        .http
        .test_endpoint(request.endpoint, &request.arguments, timeout)
        .await;

    match result {
        Ok(response) => (StatusCode::OK, Json(ApiResponse::success(response))),
        Err(e) => {
            let status = match e {
                HttpToolError::Validation(_)
                | HttpToolError::InvalidArguments(_)
                | HttpToolError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
                HttpToolError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                HttpToolError::Network(_) | HttpToolError::HttpStatus { .. } => StatusCode::BAD_GATEWAY,
            };
            (status, Json(ApiResponse::error(e.to_string())))
        }
    }
}

pub async fn infer_http_tool_variables(Json(request): Json<InferVariablesRequest>) -> impl IntoResponse {
    let endpoint = request.endpoint;
    let templates = std::iter::once(endpoint.url_template.as_str())
        .chain(endpoint.header_templates.values().map(String::as_str))
        .chain(endpoint.body_template.as_deref());

    match infer_variables(templates) {
        Ok(variables) => (StatusCode::OK, Json(ApiResponse::success(variables))),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, Json(ApiResponse::error(e.to_string()))),
    }
}
