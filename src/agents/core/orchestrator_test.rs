use super::*;
use crate::adapters::connection_pool::RemoteConnectionPool;
use crate::adapters::mcp_client::{
    ConnectionState, RemoteToolClient, RemoteTransport, RpcRequest, RpcResponse, TransportError,
};
use crate::agents::config::{ExecutionSettings, ToolDescriptor};
use crate::agents::domain::{Role, Step, TokenUsage};
use crate::agents::error::{LlmError, LlmResult};
use crate::agents::llm::CompletionResponse;
use crate::domain::{SearchHit, VectorSearchError, VectorSearchPort};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

enum Turn {
    Respond(CompletionResponse),
    Fail(LlmError),
    Stall(Duration),
}

/// Model that replays a script; the last turn repeats forever
struct ScriptedLlm {
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    fn new(turns: Vec<Turn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "script-1"
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        self.requests.lock().unwrap().push(request);
        let turn = {
            let mut turns = self.turns.lock().unwrap();
            if turns.len() > 1 {
                turns.pop_front().unwrap()
            } else {
                match turns.front().unwrap() {
                    Turn::Respond(r) => Turn::Respond(r.clone()),
                    Turn::Fail(e) => Turn::Fail(e.clone()),
                    Turn::Stall(d) => Turn::Stall(*d),
                }
            }
        };
        match turn {
            Turn::Respond(response) => Ok(response),
            Turn::Fail(error) => Err(error),
            Turn::Stall(duration) => {
                tokio::time::sleep(duration).await;
                Ok(CompletionResponse::answer("too late"))
            }
        }
    }
}

/// Search backend whose latency is taken from the query ("sleep:<ms>")
struct SlowSearch;

#[async_trait]
impl VectorSearchPort for SlowSearch {
    async fn search(
        &self,
        _collection_id: &str,
        query: &str,
        _top_k: usize,
    ) -> Result<Vec<SearchHit>, VectorSearchError> {
        if let Some(ms) = query.strip_prefix("sleep:") {
            tokio::time::sleep(Duration::from_millis(ms.parse().unwrap())).await;
        }
        Ok(vec![SearchHit {
            content: format!("hit for {}", query),
            score: 0.9,
        }])
    }
}

/// Remote server whose only tool is rate limited
struct RateLimitedServer {
    reject_auth: bool,
}

#[async_trait]
impl RemoteTransport for RateLimitedServer {
    async fn send(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        if self.reject_auth {
            return Err(TransportError::Unauthorized("HTTP 401".to_string()));
        }
        let result = match request.method.as_str() {
            "initialize" => json!({}),
            "tools/list" => json!({ "tools": [{ "name": "lookup", "inputSchema": { "type": "object" } }] }),
            _ => json!({ "content": [{ "type": "text", "text": "rate limited" }], "isError": true }),
        };
        Ok(RpcResponse::result(request.id, result))
    }
}

fn remote_client(reject_auth: bool) -> Arc<RemoteToolClient> {
    Arc::new(RemoteToolClient::new(
        "crm",
        Arc::new(RateLimitedServer { reject_auth }),
        Duration::from_secs(1),
    ))
}

fn orchestrator(llm: Arc<ScriptedLlm>, client: Option<Arc<RemoteToolClient>>) -> Orchestrator {
    let mut pool = RemoteConnectionPool::new();
    if let Some(client) = client {
        pool.insert(client);
    }
    let tools = ToolContext::new(Arc::new(pool)).with_vector_search(Arc::new(SlowSearch));
    Orchestrator::new(llm, tools)
}

fn agent(max_iterations: u32) -> AgentDefinition {
    AgentDefinition::new("researcher", "You research {{ topic }}.")
        .with_tool(ToolDescriptor::vector_search("search", "docs"))
        .with_settings(ExecutionSettings {
            max_iterations,
            per_call_timeout_ms: 1_000,
            total_timeout_ms: 60_000,
        })
}

fn search_call(id: &str, query: &str) -> ToolCall {
    ToolCall::new(id, "search", json!({ "query": query }))
}

fn tool_messages(request: &CompletionRequest) -> Vec<&Message> {
    request.messages.iter().filter(|m| m.role == Role::Tool).collect()
}

#[tokio::test]
async fn test_final_answer_succeeds() {
    let llm = ScriptedLlm::new(vec![Turn::Respond(
        CompletionResponse::answer("All done").with_usage(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 4,
            total_tokens: 14,
        }),
    )]);
    let orchestrator = orchestrator(llm.clone(), None);

    let result = orchestrator
        .execute(&agent(5), json!({ "message": "hi", "topic": "tides" }))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.output, json!({ "content": "All done" }));
    assert_eq!(result.tokens_used, 14);
    assert_eq!(llm.calls(), 1);

    let request = llm.request(0);
    assert_eq!(request.messages[0].content, "You research tides.");
    assert_eq!(request.messages[1].content, "hi");
    assert_eq!(request.tools.unwrap()[0].name, "search");
}

#[tokio::test]
async fn test_iteration_limit_with_successful_tools_is_partial_failure() {
    let llm = ScriptedLlm::new(vec![Turn::Respond(CompletionResponse::tool_calls(vec![
        search_call("c1", "tides"),
    ]))]);
    let orchestrator = orchestrator(llm.clone(), None);

    let result = orchestrator.execute(&agent(3), json!({ "message": "go" })).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::PartialFailure);
    assert_eq!(llm.calls(), 3);
    assert_eq!(result.trace.model_turns(), 3);
    assert_eq!(result.trace.tool_calls().count(), 3);
    assert!(result.error.unwrap().contains("iteration limit of 3"));
}

#[tokio::test]
async fn test_iteration_limit_without_success_is_failed() {
    let llm = ScriptedLlm::new(vec![Turn::Respond(CompletionResponse::tool_calls(vec![
        ToolCall::new("c1", "does_not_exist", json!({})),
    ]))]);
    let orchestrator = orchestrator(llm.clone(), None);

    let result = orchestrator.execute(&agent(2), json!({ "message": "go" })).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(llm.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_results_follow_request_order_not_completion_order() {
    let llm = ScriptedLlm::new(vec![
        Turn::Respond(CompletionResponse::tool_calls(vec![
            search_call("slow", "sleep:300"),
            search_call("medium", "sleep:100"),
            search_call("fast", "sleep:1"),
        ])),
        Turn::Respond(CompletionResponse::answer("done")),
    ]);
    let orchestrator = orchestrator(llm.clone(), None);

    let started = Instant::now();
    let result = orchestrator.execute(&agent(5), json!({ "message": "go" })).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Success);
    // Concurrent: bounded by the slowest call, not the sum
    assert!(started.elapsed() < Duration::from_millis(400));

    let second = llm.request(1);
    let ids: Vec<&str> = tool_messages(&second)
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(ids, ["slow", "medium", "fast"]);
    assert!(tool_messages(&second)[0].content.contains("hit for sleep:300"));

    let recorded: Vec<String> = result
        .trace
        .tool_calls()
        .filter_map(|s| match s {
            Step::ToolCall { tool_call_id, .. } => Some(tool_call_id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(recorded, ["slow", "medium", "fast"]);
}

#[tokio::test]
async fn test_tool_failures_are_fed_back_to_the_model() {
    let llm = ScriptedLlm::new(vec![
        Turn::Respond(CompletionResponse::tool_calls(vec![
            ToolCall::new("c1", "unknown", json!({})),
            ToolCall::new("c2", "search", json!("{broken")),
        ])),
        Turn::Respond(CompletionResponse::answer("recovered")),
    ]);
    let orchestrator = orchestrator(llm.clone(), None);

    let result = orchestrator.execute(&agent(5), json!({ "message": "go" })).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Success);
    let request = llm.request(1);
    let tool_results = tool_messages(&request);
    let unknown: Value = serde_json::from_str(&tool_results[0].content).unwrap();
    let malformed: Value = serde_json::from_str(&tool_results[1].content).unwrap();
    assert_eq!(unknown["kind"], "tool_not_found");
    assert_eq!(malformed["kind"], "validation");
}

#[tokio::test]
async fn test_remote_tool_error_is_recoverable() {
    let client = remote_client(false);
    let llm = ScriptedLlm::new(vec![
        Turn::Respond(CompletionResponse::tool_calls(vec![ToolCall::new("c1", "lookup", json!({}))])),
        Turn::Respond(CompletionResponse::answer("will retry later")),
    ]);
    let orchestrator = orchestrator(llm.clone(), Some(client.clone()));
    let agent = agent(5).with_tool(ToolDescriptor::remote("crm", "lookup"));

    let result = orchestrator.execute(&agent, json!({ "message": "go" })).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(client.state(), ConnectionState::Connected);

    let payload: Value = serde_json::from_str(&tool_messages(&llm.request(1))[0].content).unwrap();
    assert_eq!(payload["kind"], "tool_error");
    assert_eq!(payload["error"], "Remote tool error: rate limited");
}

#[tokio::test]
async fn test_remote_auth_failure_is_fatal() {
    let llm = ScriptedLlm::new(vec![
        Turn::Respond(CompletionResponse::tool_calls(vec![ToolCall::new("c1", "lookup", json!({}))])),
        Turn::Respond(CompletionResponse::answer("unreachable")),
    ]);
    let orchestrator = orchestrator(llm.clone(), Some(remote_client(true)));
    let agent = agent(5).with_tool(ToolDescriptor::remote("crm", "lookup"));

    let result = orchestrator.execute(&agent, json!({ "message": "go" })).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(llm.calls(), 1);
    assert!(result.error.unwrap().contains("Authentication failed"));
    // The failed call is still recorded
    assert_eq!(result.trace.tool_calls().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_per_call_timeout_is_recoverable() {
    let llm = ScriptedLlm::new(vec![
        Turn::Respond(CompletionResponse::tool_calls(vec![search_call("c1", "sleep:5000")])),
        Turn::Respond(CompletionResponse::answer("gave up on search")),
    ]);
    let orchestrator = orchestrator(llm.clone(), None);

    let result = orchestrator.execute(&agent(5), json!({ "message": "go" })).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Success);
    let payload: Value = serde_json::from_str(&tool_messages(&llm.request(1))[0].content).unwrap();
    assert_eq!(payload["kind"], "timeout");
}

#[tokio::test(start_paused = true)]
async fn test_tool_consuming_last_budget_times_out_execution() {
    let llm = ScriptedLlm::new(vec![
        Turn::Respond(CompletionResponse::tool_calls(vec![search_call("c1", "sleep:5000")])),
        Turn::Respond(CompletionResponse::answer("never reached")),
    ]);
    let orchestrator = orchestrator(llm.clone(), None);
    let agent = agent(5).with_settings(ExecutionSettings {
        max_iterations: 5,
        per_call_timeout_ms: 10_000,
        total_timeout_ms: 2_000,
    });

    let result = orchestrator.execute(&agent, json!({ "message": "go" })).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::TimedOut);
    assert_eq!(llm.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_model_times_out_execution() {
    let llm = ScriptedLlm::new(vec![Turn::Stall(Duration::from_secs(600))]);
    let orchestrator = orchestrator(llm.clone(), None);

    let result = orchestrator.execute(&agent(5), json!({ "message": "go" })).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::TimedOut);
    assert!(matches!(&result.trace.steps[0], Step::ModelTurn { error: Some(_), .. }));
}

#[tokio::test]
async fn test_model_error_fails_execution() {
    let llm = ScriptedLlm::new(vec![Turn::Fail(LlmError::Api {
        status: 500,
        message: "boom".to_string(),
    })]);
    let orchestrator = orchestrator(llm, None);

    let result = orchestrator.execute(&agent(5), json!({ "message": "go" })).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.trace.model_turns(), 1);
    assert_eq!(result.output, Value::Null);
}

#[tokio::test]
async fn test_registry_errors_are_returned() {
    let llm = ScriptedLlm::new(vec![Turn::Respond(CompletionResponse::answer("x"))]);
    let orchestrator = orchestrator(llm.clone(), None);
    let agent = agent(5).with_tool(ToolDescriptor::vector_search("search", "other"));

    let err = orchestrator.execute(&agent, json!({})).await.unwrap_err();

    assert!(err.to_string().contains("registered more than once"));
    assert_eq!(llm.calls(), 0);
}
