use agentforge::agents::config::{AgentDefinition, LlmProviderConfig, ToolDescriptor};
use agentforge::agents::domain::{Role, ToolCall};
use agentforge::agents::error::LlmResult;
use agentforge::agents::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use agentforge::agents::AgentHandler;
use agentforge::config::{ServerSettings, Settings};
use agentforge::domain::{HttpEndpointConfig, HttpMethod, VariableDef, VariableKind};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Path,
    http::{Request, StatusCode},
    routing::get,
    Json, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

/// Requests `weather` once, then answers with what the tool returned
struct WeatherModel;

#[async_trait]
impl LlmProvider for WeatherModel {
    fn name(&self) -> &str {
        "weather-model"
    }

    fn model(&self) -> &str {
        "weather-1"
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        match request.messages.last() {
            Some(last) if last.role == Role::Tool => {
                Ok(CompletionResponse::answer(format!("Forecast: {}", last.content)))
            }
            _ => Ok(CompletionResponse::tool_calls(vec![ToolCall::new(
                "call-1",
                "weather",
                json!({ "city": "Oslo" }),
            )])),
        }
    }
}

async fn spawn_weather_service() -> String {
    let app = Router::new().route(
        "/forecast/:city",
        get(|Path(city): Path<String>| async move { Json(json!({ "city": city, "sky": "clear" })) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn app() -> Router {
    let base = spawn_weather_service().await;
    let endpoint = HttpEndpointConfig::new(HttpMethod::Get, format!("{}/forecast/{{{{city}}}}", base))
        .with_variable(VariableDef::new("city", VariableKind::String, true));

    let settings = Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        llm: LlmProviderConfig::default(),
        remote_servers: vec![],
        vector_search: None,
        agents: vec![AgentDefinition::new("forecaster", "You report the weather.")
            .with_tool(ToolDescriptor::http("weather", endpoint))],
    };

    let handler = AgentHandler::new(Arc::new(settings)).with_provider(Arc::new(WeatherModel));
    agentforge::create_app(Arc::new(handler))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_execute_agent_end_to_end() {
    let app = app().await;

    let response = app
        .oneshot(post_json("/api/agents/forecaster/execute", json!({ "message": "Weather in Oslo?" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert!(body["executionId"].as_str().is_some());
    assert!(body["output"]["content"].as_str().unwrap().contains("clear"));

    let steps = body["trace"]["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0]["type"], "model_turn");
    assert_eq!(steps[1]["type"], "tool_call");
    assert_eq!(steps[1]["toolName"], "weather");
    assert_eq!(steps[1]["result"]["statusCode"], 200);
    assert_eq!(steps[2]["type"], "model_turn");
}

#[tokio::test]
async fn test_unknown_agent_is_404() {
    let app = app().await;

    let response = app
        .oneshot(post_json("/api/agents/nobody/execute", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_list_agents_and_health() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/agents").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["id"], "forecaster");
    assert_eq!(body["data"][0]["tools"], json!(["weather"]));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["checks"]["agents"], 1);
}

#[tokio::test]
async fn test_unknown_remote_server_is_404() {
    let app = app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/remote-servers/crm/tools")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_infer_variables() {
    let app = app().await;

    let response = app
        .oneshot(post_json(
            "/api/http-tools/infer-variables",
            json!({
                "endpoint": {
                    "method": "POST",
                    "url_template": "https://api.example.com/{{tenant}}/tickets",
                    "body_template": "{\"title\": \"{{title}}\"}"
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["name"].as_str())
        .collect();
    assert_eq!(names, ["tenant", "title"]);
}

#[tokio::test]
async fn test_http_tool_validation_error() {
    let app = app().await;

    let response = app
        .oneshot(post_json(
            "/api/http-tools/test",
            json!({
                "endpoint": {
                    "method": "GET",
                    "url_template": "https://api.example.com/{{id}}",
                    "variables": [{ "name": "id", "kind": "number", "required": true }]
                },
                "arguments": { "id": "not-a-number" }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
