//! # AgentForge - Agent Execution Engine
//!
//! Runs configured agents: a model is driven in a bounded loop, the tool calls
//! it requests are dispatched concurrently to HTTP endpoints, remote
//! capability servers and a vector-knowledge service, and every step is
//! recorded in an execution trace.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentforge::agents::AgentHandler;
//! use agentforge::config::Settings;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Arc::new(Settings::new()?);
//!     let handler = AgentHandler::new(settings);
//!     let result = handler
//!         .execute("support", serde_json::json!({ "message": "Where is my order?" }))
//!         .await?;
//!     println!("{}", result.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! AgentForge follows Hexagonal Architecture:
//! - **Domain**: Template engine, endpoint definitions and ports
//! - **Adapters**: HTTP executor, remote tool client, vector search, REST API
//! - **Agents**: Registry, orchestrator, recorder and LLM providers
//! - **Config**: Configuration management

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod config;
pub mod domain;

use crate::adapters::api_handler::{self, ApiState};
use crate::adapters::health_handler::HealthHandler;
use crate::agents::handler::AgentHandler;
use axum::{routing::{get, post}, Router};
use std::sync::Arc;

/// Creates the Axum application router with all endpoints configured.
pub fn create_app(agents: Arc<AgentHandler>) -> Router {
    let health_handler = Arc::new(HealthHandler::new(
        agents.tools().remote.clone(),
        agents.settings().agents.len(),
    ));

    let health_router = Router::new()
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/ready", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.ready().await }
            }
        }))
        .route("/health/live", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }));

    let api_router = Router::new()
        .route("/agents", get(api_handler::list_agents))
        .route("/agents/:id", get(api_handler::get_agent))
        .route("/agents/:id/execute", post(api_handler::execute_agent))
        .route("/remote-servers", get(api_handler::list_remote_servers))
        .route("/remote-servers/:id/tools", get(api_handler::list_remote_tools))
        .route("/http-tools/test", post(api_handler::test_http_tool))
        .route("/http-tools/infer-variables", post(api_handler::infer_http_tool_variables))
        .with_state(ApiState { agents });

    health_router.nest("/api", api_router).layer(
        tower_http::cors::CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}
