//! Remote Tool Client
//!
//! One client per remote capability server. The client owns the handshake,
//! the cached capability list and the correlation of requests to replies.
//! The underlying protocol is not multiplexed: callers queue on the session
//! lock and exactly one request is on the wire at a time.
//!
//! Transport faults (I/O errors, timeouts, uncorrelated replies) degrade the
//! shared connection and force a reconnect before further use. Tool failures
//! reported by the server itself leave the connection healthy.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::adapters::schema_validator::validate_arguments;
use crate::config::RemoteServerConfig;

/// JSON-RPC error code servers use to reject credentials
pub const AUTH_ERROR_CODE: i64 = -32001;

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "Mcp-Session-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    Connected,
    Degraded,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Handshaking => write!(f, "handshaking"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Degraded => write!(f, "degraded"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Tool not found on remote server: {0}")]
    ToolNotFound(String),

    #[error("Invalid arguments: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Remote call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Remote tool error: {0}")]
    Tool(String),
}

/// A tool advertised by a remote server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCapability {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "default_input_schema")]
    pub input_schema: Value,
}

fn default_input_schema() -> Value {
    json!({ "type": "object" })
}

/// A request handed to the transport
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    pub params: Option<Value>,
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A reply as received from the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Session token surfaced by the transport layer (e.g. a response header)
    #[serde(skip)]
    pub session_token: Option<String>,
}

impl RpcResponse {
    pub fn result(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
            session_token: None,
        }
    }

    pub fn error(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            session_token: None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Io(String),
}

/// A single request/response channel to a remote server
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn send(&self, request: RpcRequest) -> Result<RpcResponse, TransportError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
}

/// JSON-RPC over HTTP POST
pub struct HttpJsonRpcTransport {
    client: Client,
    url: String,
    headers: Vec<(String, String)>,
}

impl HttpJsonRpcTransport {
    pub fn new(url: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            headers,
        }
    }

    /// Build a transport from server configuration, resolving credentials.
    pub fn from_config(config: &RemoteServerConfig) -> Result<Self, RemoteError> {
        let headers = config.auth.headers().map_err(RemoteError::Auth)?;
        Ok(Self::new(config.url.clone(), headers))
    }
}

#[async_trait]
impl RemoteTransport for HttpJsonRpcTransport {
    async fn send(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: request.id,
            method: &request.method,
            params: request.params.as_ref(),
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header("Accept", "application/json")
            .json(&body);

        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &request.session_token {
            builder = builder.header(SESSION_HEADER, token.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Unauthorized(format!("HTTP {}: {}", status.as_u16(), text)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Io(format!("HTTP {}: {}", status.as_u16(), text)));
        }

        let session_token = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut reply: RpcResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Io(format!("malformed reply: {}", e)))?;
        reply.session_token = session_token;
        Ok(reply)
    }
}

#[derive(Default)]
struct Session {
    token: Option<String>,
    capabilities: Vec<ToolCapability>,
    /// Set while a request is on the wire; still set on acquisition means
    /// the previous holder was cancelled mid-request.
    in_flight: bool,
}

/// Client for one remote capability server, shared by every execution that
/// references the server.
pub struct RemoteToolClient {
    server_id: String,
    transport: Arc<dyn RemoteTransport>,
    handshake_timeout: Duration,
    session: Mutex<Session>,
    state: watch::Sender<ConnectionState>,
    next_id: AtomicU64,
}

impl RemoteToolClient {
    pub fn new(
        server_id: impl Into<String>,
        transport: Arc<dyn RemoteTransport>,
        handshake_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            server_id: server_id.into(),
            transport,
            handshake_timeout,
            session: Mutex::new(Session::default()),
            state,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RemoteServerConfig) -> Result<Self, RemoteError> {
        let transport = HttpJsonRpcTransport::from_config(config)?;
        Ok(Self::new(
            config.id.clone(),
            Arc::new(transport),
            Duration::from_millis(config.handshake_timeout_ms),
        ))
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Perform the handshake and fetch the capability list, replacing any
    /// existing session.
    pub async fn connect(&self) -> Result<Vec<ToolCapability>, RemoteError> {
        let mut session = self.session.lock().await;
        self.handshake(&mut session).await?;
        Ok(session.capabilities.clone())
    }

    /// Cached capabilities, connecting first when not connected.
    pub async fn list_tools(&self) -> Result<Vec<ToolCapability>, RemoteError> {
        let mut session = self.session.lock().await;
        self.ensure_connected(&mut session).await?;
        Ok(session.capabilities.clone())
    }

    /// Invoke one remote tool. Calls queue behind any request already in
    /// flight on this connection.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value, RemoteError> {
        let mut session = self.session.lock().await;
        self.ensure_connected(&mut session).await?;

        let capability = session
            .capabilities
            .iter()
            .find(|c| c.name == tool_name)
            .ok_or_else(|| RemoteError::ToolNotFound(tool_name.to_string()))?;
        validate_arguments(&capability.input_schema, &arguments).map_err(RemoteError::Validation)?;

        debug!(server = %self.server_id, tool = tool_name, "Invoking remote tool");
        let params = json!({ "name": tool_name, "arguments": arguments });
        let reply = self
            .round_trip(&mut session, "tools/call", Some(params), timeout)
            .await?;

        if let Some(error) = reply.error {
            return Err(RemoteError::Tool(error.message));
        }
        extract_output(reply.result.unwrap_or(Value::Null))
    }

    async fn ensure_connected(&self, session: &mut Session) -> Result<(), RemoteError> {
        if session.in_flight {
            session.in_flight = false;
            self.degrade("previous request was cancelled while in flight");
        }
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }
        self.handshake(session).await
    }

    async fn handshake(&self, session: &mut Session) -> Result<(), RemoteError> {
        self.set_state(ConnectionState::Handshaking);
        let mut abandoned = AbandonedHandshake {
            state: &self.state,
            armed: true,
        };
        session.token = None;
        session.in_flight = false;

        let outcome = self.open_session(session).await;
        abandoned.armed = false;

        match outcome {
            Ok(()) => {
                info!(
                    server = %self.server_id,
                    tools = session.capabilities.len(),
                    "Connected to remote server"
                );
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                warn!(server = %self.server_id, error = %e, "Remote handshake failed");
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn open_session(&self, session: &mut Session) -> Result<(), RemoteError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let reply = self
            .round_trip(session, "initialize", Some(params), self.handshake_timeout)
            .await
            .map_err(handshake_error)?;

        if let Some(error) = reply.error {
            return Err(if error.code == AUTH_ERROR_CODE {
                RemoteError::Auth(error.message)
            } else {
                RemoteError::HandshakeFailed(error.message)
            });
        }

        session.token = reply.session_token.or_else(|| {
            reply
                .result
                .as_ref()
                .and_then(|r| r.get("sessionToken"))
                .and_then(|t| t.as_str())
                .map(str::to_string)
        });

        session.capabilities = self
            .fetch_capabilities(session, self.handshake_timeout)
            .await
            .map_err(handshake_error)?;
        Ok(())
    }

    async fn fetch_capabilities(
        &self,
        session: &mut Session,
        timeout: Duration,
    ) -> Result<Vec<ToolCapability>, RemoteError> {
        #[derive(Deserialize)]
        struct ListToolsResult {
            #[serde(default)]
            tools: Vec<ToolCapability>,
        }

        let reply = self.round_trip(session, "tools/list", None, timeout).await?;
        if let Some(error) = reply.error {
            return Err(RemoteError::Protocol(format!("tools/list failed: {}", error.message)));
        }
        let listed: ListToolsResult = serde_json::from_value(reply.result.unwrap_or(Value::Null))
            .map_err(|e| RemoteError::Protocol(format!("malformed tools/list result: {}", e)))?;
        Ok(listed.tools)
    }

    async fn round_trip(
        &self,
        session: &mut Session,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<RpcResponse, RemoteError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let request = RpcRequest {
            id,
            method: method.to_string(),
            params,
            session_token: session.token.clone(),
        };

        session.in_flight = true;
        let outcome = tokio::time::timeout(timeout, self.transport.send(request)).await;
        session.in_flight = false;

        match outcome {
            Err(_) => {
                self.degrade("request timed out");
                Err(RemoteError::Timeout(timeout))
            }
            Ok(Err(TransportError::Unauthorized(message))) => {
                self.degrade("credentials rejected");
                Err(RemoteError::Auth(message))
            }
            Ok(Err(TransportError::Io(message))) => {
                self.degrade("transport failure");
                Err(RemoteError::Connection(message))
            }
            Ok(Ok(reply)) if reply.id != id => {
                self.degrade("reply out of sequence");
                Err(RemoteError::Protocol(format!(
                    "reply id {} does not match request id {}",
                    reply.id, id
                )))
            }
            Ok(Ok(reply)) => Ok(reply),
        }
    }

    fn degrade(&self, reason: &str) {
        if self.state() == ConnectionState::Connected {
            warn!(server = %self.server_id, reason, "Remote connection degraded");
            self.set_state(ConnectionState::Degraded);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

/// Drops a cancelled handshake back to `Disconnected` so the state never
/// reports `Handshaking` with no handshake running.
struct AbandonedHandshake<'a> {
    state: &'a watch::Sender<ConnectionState>,
    armed: bool,
}

impl Drop for AbandonedHandshake<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }
}

fn handshake_error(err: RemoteError) -> RemoteError {
    match err {
        RemoteError::Auth(_) | RemoteError::HandshakeFailed(_) => err,
        other => RemoteError::HandshakeFailed(other.to_string()),
    }
}

/// Turn a `tools/call` result into the tool output.
///
/// Content items of type `text` are joined and parsed as JSON when possible.
/// A result flagged `isError` is an application-level tool failure.
fn extract_output(result: Value) -> Result<Value, RemoteError> {
    let is_error = result.get("isError").and_then(|v| v.as_bool()).unwrap_or(false);

    let text = result.get("content").and_then(|c| c.as_array()).map(|items| {
        items
            .iter()
            .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    });

    if is_error {
        return Err(RemoteError::Tool(
            text.filter(|t| !t.is_empty())
                .unwrap_or_else(|| "remote tool reported an error".to_string()),
        ));
    }

    if let Some(structured) = result.get("structuredContent") {
        return Ok(structured.clone());
    }
    if let Some(text) = text {
        return Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)));
    }
    if let Some(value) = result.get("value") {
        return Ok(value.clone());
    }
    Ok(result)
}

#[cfg(test)]
#[path = "mcp_client_test.rs"]
mod mcp_client_test;
