use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapters::connection_pool::RemoteConnectionPool;
use crate::adapters::mcp_client::ConnectionState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub agents: usize,
    pub remote_servers: BTreeMap<String, ConnectionState>,
}

pub struct HealthHandler {
    remote: Arc<RemoteConnectionPool>,
    agent_count: usize,
    start_time: std::time::Instant,
}

impl HealthHandler {
    pub fn new(remote: Arc<RemoteConnectionPool>, agent_count: usize) -> Self {
        Self {
            remote,
            agent_count,
            start_time: std::time::Instant::now(),
        }
    }

    /// Basic health check - returns 200 if server is running
    pub async fn health(&self) -> impl IntoResponse {
        let status = HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            checks: HealthChecks {
                agents: self.agent_count,
                remote_servers: self.remote.states().into_iter().collect(),
            },
        };

        (StatusCode::OK, Json(status))
    }

    /// Readiness check - returns 200 once at least one agent is configured
    pub async fn ready(&self) -> impl IntoResponse {
        if self.agent_count > 0 {
            (StatusCode::OK, Json(serde_json::json!({
                "status": "ready",
                "message": "Server is ready to accept requests"
            })))
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({
                "status": "not_ready",
                "message": "No agents configured"
            })))
        }
    }

    /// Liveness check - returns 200 if server is alive
    pub async fn live(&self) -> impl IntoResponse {
        (StatusCode::OK, Json(serde_json::json!({
            "status": "alive",
            "message": "Server is alive"
        })))
    }
}
