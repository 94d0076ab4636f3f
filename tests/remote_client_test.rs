//! Remote tool client against an in-process JSON-RPC server over HTTP

use agentforge::adapters::mcp_client::{ConnectionState, RemoteError, RemoteToolClient};
use agentforge::config::{RemoteAuthConfig, RemoteServerConfig};
use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::time::Duration;

const TOKEN: &str = "secret";
const SESSION: &str = "sess-42";

async fn rpc(headers: HeaderMap, Json(request): Json<Value>) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, HeaderMap::new(), Json(json!({ "error": "denied" })));
    }

    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default();
    let has_session = headers
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
        == Some(SESSION);

    let mut reply_headers = HeaderMap::new();
    let body = match method {
        "initialize" => {
            reply_headers.insert("mcp-session-id", SESSION.parse().unwrap());
            json!({ "jsonrpc": "2.0", "id": id, "result": { "protocolVersion": "2025-03-26" } })
        }
        _ if !has_session => json!({
            "jsonrpc": "2.0", "id": id, "error": { "code": -32600, "message": "missing session" }
        }),
        "tools/list" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "tools": [{
                "name": "add",
                "description": "Add two numbers",
                "inputSchema": {
                    "type": "object",
                    "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
                    "required": ["a", "b"]
                }
            }] }
        }),
        "tools/call" => {
            let args = &request["params"]["arguments"];
            let sum = args["a"].as_f64().unwrap_or(0.0) + args["b"].as_f64().unwrap_or(0.0);
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{ "type": "text", "text": json!({ "sum": sum }).to_string() }] }
            })
        }
        _ => json!({ "jsonrpc": "2.0", "id": id, "error": { "code": -32601, "message": "unknown method" } }),
    };
    (StatusCode::OK, reply_headers, Json(body))
}

async fn spawn_server() -> String {
    let app = Router::new().route("/mcp", post(rpc));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/mcp", addr)
}

fn server_config(url: String, token: &str) -> RemoteServerConfig {
    RemoteServerConfig {
        id: "calc".to_string(),
        url,
        auth: RemoteAuthConfig::Bearer {
            token: Some(token.to_string()),
            token_env: None,
        },
        enabled: true,
        handshake_timeout_ms: 2_000,
    }
}

#[tokio::test]
async fn test_handshake_and_tool_call_over_http() {
    let url = spawn_server().await;
    let client = RemoteToolClient::from_config(&server_config(url, TOKEN)).unwrap();

    let tools = client.connect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "add");

    let output = client
        .invoke("add", json!({ "a": 2, "b": 3 }), Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(output, json!({ "sum": 5.0 }));
}

#[tokio::test]
async fn test_schema_mismatch_is_rejected_locally() {
    let url = spawn_server().await;
    let client = RemoteToolClient::from_config(&server_config(url, TOKEN)).unwrap();

    let err = client
        .invoke("add", json!({ "a": "two" }), Duration::from_secs(2))
        .await
        .unwrap_err();
    match err {
        RemoteError::Validation(problems) => assert_eq!(problems.len(), 2),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_rejected_credentials() {
    let url = spawn_server().await;
    let client = RemoteToolClient::from_config(&server_config(url, "wrong")).unwrap();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, RemoteError::Auth(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_unreachable_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/mcp", listener.local_addr().unwrap());
    drop(listener);

    let client = RemoteToolClient::from_config(&server_config(url, TOKEN)).unwrap();
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, RemoteError::HandshakeFailed(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
