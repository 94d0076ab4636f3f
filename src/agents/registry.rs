//! Tool Registry
//!
//! Binds each of an agent's tool descriptors to a live backend once per
//! execution. Lookups afterwards are plain map reads.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::adapters::connection_pool::RemoteConnectionPool;
use crate::adapters::http_executor::{CompiledEndpoint, HttpToolExecutor};
use crate::adapters::mcp_client::RemoteToolClient;
use crate::agents::config::{AgentDefinition, ToolDescriptor};
use crate::agents::domain::ToolDefinition;
use crate::agents::error::{RegistryError, ToolCallError};
use crate::domain::VectorSearchPort;

/// Process-owned collaborators tools are bound to
#[derive(Clone)]
pub struct ToolContext {
    pub remote: Arc<RemoteConnectionPool>,
    pub vector_search: Option<Arc<dyn VectorSearchPort>>,
    pub http: HttpToolExecutor,
}

impl ToolContext {
    pub fn new(remote: Arc<RemoteConnectionPool>) -> Self {
        Self {
            remote,
            vector_search: None,
            http: HttpToolExecutor::new(),
        }
    }

    pub fn with_vector_search(mut self, port: Arc<dyn VectorSearchPort>) -> Self {
        self.vector_search = Some(port);
        self
    }

    pub fn with_http(mut self, http: HttpToolExecutor) -> Self {
        self.http = http;
        self
    }
}

/// A tool bound to its backend
pub enum ResolvedTool {
    VectorSearch {
        port: Arc<dyn VectorSearchPort>,
        collection_id: String,
        top_k: usize,
        description: String,
    },
    Remote {
        client: Arc<RemoteToolClient>,
        tool_name: String,
        description: Option<String>,
    },
    Http {
        executor: HttpToolExecutor,
        endpoint: CompiledEndpoint,
        description: String,
    },
}

impl ResolvedTool {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolvedTool::VectorSearch { .. } => "vector_search",
            ResolvedTool::Remote { .. } => "remote",
            ResolvedTool::Http { .. } => "http",
        }
    }

    /// Run one call against the bound backend.
    pub async fn invoke(&self, arguments: &Value, timeout: Duration) -> Result<Value, ToolCallError> {
        match self {
            ResolvedTool::VectorSearch {
                port,
                collection_id,
                top_k,
                ..
            } => {
                let (query, top_k) = search_arguments(arguments, *top_k)?;
                let hits = port.search(collection_id, &query, top_k).await?;
                Ok(json!({ "results": hits }))
            }
            ResolvedTool::Remote {
                client, tool_name, ..
            } => Ok(client.invoke(tool_name, arguments.clone(), timeout).await?),
            ResolvedTool::Http {
                executor, endpoint, ..
            } => {
                let response = executor.execute(endpoint, arguments, timeout).await?;
                serde_json::to_value(response)
                    .map_err(|e| ToolCallError::InvalidArguments(e.to_string()))
            }
        }
    }

    async fn definition(&self, name: &str) -> ToolDefinition {
        match self {
            ResolvedTool::VectorSearch { description, .. } => ToolDefinition::new(
                name,
                non_empty(description, "Search the knowledge base for relevant passages"),
                json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Search query" },
                        "top_k": { "type": "integer", "description": "Number of results to return" }
                    },
                    "required": ["query"]
                }),
            ),
            ResolvedTool::Remote {
                client,
                tool_name,
                description,
            } => {
                let capability = match client.list_tools().await {
                    Ok(tools) => tools.into_iter().find(|t| &t.name == tool_name),
                    Err(e) => {
                        warn!(server = client.server_id(), tool = %tool_name, error = %e, "Could not fetch remote tool schema");
                        None
                    }
                };
                let (remote_description, schema) = match capability {
                    Some(c) => (c.description, c.input_schema),
                    None => (None, json!({ "type": "object" })),
                };
                ToolDefinition::new(
                    name,
                    description.clone().or(remote_description).unwrap_or_default(),
                    schema,
                )
            }
            ResolvedTool::Http {
                endpoint,
                description,
                ..
            } => ToolDefinition::new(
                name,
                non_empty(description, "Call an HTTP endpoint"),
                endpoint.config().input_schema(),
            ),
        }
    }
}

fn non_empty(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn search_arguments(arguments: &Value, default_top_k: usize) -> Result<(String, usize), ToolCallError> {
    let query = arguments
        .get("query")
        .and_then(|q| q.as_str())
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ToolCallError::InvalidArguments("'query' must be a non-empty string".to_string()))?;

    let top_k = match arguments.get("top_k") {
        None | Some(Value::Null) => default_top_k,
        Some(v) => v
            .as_u64()
            .filter(|k| *k > 0)
            .map(|k| k as usize)
            .ok_or_else(|| ToolCallError::InvalidArguments("'top_k' must be a positive integer".to_string()))?,
    };

    Ok((query.to_string(), top_k))
}

/// Per-execution mapping from tool name to bound backend
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, ResolvedTool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.order).finish()
    }
}

impl ToolRegistry {
    /// Bind every descriptor of `definition`. Fails on the first duplicate
    /// name, dangling reference or invalid endpoint.
    pub fn build(definition: &AgentDefinition, context: &ToolContext) -> Result<Self, RegistryError> {
        let mut order = Vec::with_capacity(definition.tools.len());
        let mut tools = HashMap::with_capacity(definition.tools.len());

        for descriptor in &definition.tools {
            let name = descriptor.name().to_string();
            if tools.contains_key(&name) {
                return Err(RegistryError::DuplicateTool(name));
            }

            let resolved = bind(descriptor, context)?;
            order.push(name.clone());
            tools.insert(name, resolved);
        }

        Ok(Self { order, tools })
    }

    pub fn resolve(&self, name: &str) -> Result<&ResolvedTool, RegistryError> {
        self.tools
            .get(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))
    }

    /// Tool names in registration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Definitions offered to the model, in registration order
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = Vec::with_capacity(self.order.len());
        for name in &self.order {
            if let Some(tool) = self.tools.get(name) {
                definitions.push(tool.definition(name).await);
            }
        }
        definitions
    }
}

fn bind(descriptor: &ToolDescriptor, context: &ToolContext) -> Result<ResolvedTool, RegistryError> {
    match descriptor {
        ToolDescriptor::VectorSearch {
            name,
            description,
            collection_id,
            top_k,
        } => {
            let port = context
                .vector_search
                .clone()
                .ok_or_else(|| RegistryError::MissingCollaborator {
                    tool: name.clone(),
                    collaborator: "vector search service",
                })?;
            Ok(ResolvedTool::VectorSearch {
                port,
                collection_id: collection_id.clone(),
                top_k: *top_k,
                description: description.clone(),
            })
        }
        ToolDescriptor::Remote {
            server_id,
            tool_name,
            description,
            ..
        } => {
            let client = context
                .remote
                .get(server_id)
                .ok_or_else(|| RegistryError::UnknownServer {
                    tool: descriptor.name().to_string(),
                    server_id: server_id.clone(),
                })?;
            Ok(ResolvedTool::Remote {
                client,
                tool_name: tool_name.clone(),
                description: description.clone(),
            })
        }
        ToolDescriptor::Http {
            name,
            description,
            endpoint,
        } => {
            let endpoint = CompiledEndpoint::compile(endpoint.clone()).map_err(|source| {
                RegistryError::InvalidEndpoint {
                    tool: name.clone(),
                    source,
                }
            })?;
            Ok(ResolvedTool::Http {
                executor: context.http.clone(),
                endpoint,
                description: description.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mcp_client::{RemoteTransport, RpcRequest, RpcResponse, TransportError};
    use crate::domain::{HttpEndpointConfig, HttpMethod, SearchHit, VariableDef, VariableKind, VectorSearchError};
    use async_trait::async_trait;

    struct StaticSearch;

    #[async_trait]
    impl VectorSearchPort for StaticSearch {
        async fn search(
            &self,
            collection_id: &str,
            query: &str,
            top_k: usize,
        ) -> Result<Vec<SearchHit>, VectorSearchError> {
            Ok((0..top_k)
                .map(|i| SearchHit {
                    content: format!("{}:{}:{}", collection_id, query, i),
                    score: 1.0 - i as f32 * 0.1,
                })
                .collect())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl RemoteTransport for Unreachable {
        async fn send(&self, _request: RpcRequest) -> Result<RpcResponse, TransportError> {
            Err(TransportError::Io("connection refused".to_string()))
        }
    }

    fn context() -> ToolContext {
        let mut pool = RemoteConnectionPool::new();
        pool.insert(Arc::new(RemoteToolClient::new(
            "crm",
            Arc::new(Unreachable),
            Duration::from_millis(100),
        )));
        ToolContext::new(Arc::new(pool)).with_vector_search(Arc::new(StaticSearch))
    }

    fn ticket_endpoint() -> HttpEndpointConfig {
        HttpEndpointConfig::new(HttpMethod::Get, "https://api.example.com/tickets/{{id}}")
            .with_variable(VariableDef::new("id", VariableKind::Number, true))
    }

    #[test]
    fn test_build_and_resolve() {
        let agent = AgentDefinition::new("a", "prompt")
            .with_tool(ToolDescriptor::vector_search("kb", "faq"))
            .with_tool(ToolDescriptor::remote("crm", "lookup"))
            .with_tool(ToolDescriptor::http("ticket", ticket_endpoint()));

        let registry = ToolRegistry::build(&agent, &context()).unwrap();

        assert_eq!(registry.names(), ["kb", "lookup", "ticket"]);
        assert_eq!(registry.resolve("kb").unwrap().kind(), "vector_search");
        assert_eq!(registry.resolve("lookup").unwrap().kind(), "remote");
        assert_eq!(registry.resolve("ticket").unwrap().kind(), "http");
        assert!(matches!(
            registry.resolve("nope"),
            Err(RegistryError::ToolNotFound(ref n)) if n == "nope"
        ));
    }

    #[test]
    fn test_duplicate_names_fail() {
        let agent = AgentDefinition::new("a", "prompt")
            .with_tool(ToolDescriptor::vector_search("lookup", "faq"))
            .with_tool(ToolDescriptor::remote("crm", "lookup"));

        let err = ToolRegistry::build(&agent, &context()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool(ref n) if n == "lookup"));
    }

    #[test]
    fn test_dangling_references_fail() {
        let agent = AgentDefinition::new("a", "prompt").with_tool(ToolDescriptor::remote("billing", "charge"));
        assert!(matches!(
            ToolRegistry::build(&agent, &context()),
            Err(RegistryError::UnknownServer { .. })
        ));

        let agent = AgentDefinition::new("a", "prompt").with_tool(ToolDescriptor::vector_search("kb", "faq"));
        let bare = ToolContext::new(Arc::new(RemoteConnectionPool::new()));
        assert!(matches!(
            ToolRegistry::build(&agent, &bare),
            Err(RegistryError::MissingCollaborator { .. })
        ));

        let broken = HttpEndpointConfig::new(HttpMethod::Get, "https://x.test/{{nope}}");
        let agent = AgentDefinition::new("a", "prompt").with_tool(ToolDescriptor::http("t", broken));
        assert!(matches!(
            ToolRegistry::build(&agent, &context()),
            Err(RegistryError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_vector_search_invocation() {
        let agent = AgentDefinition::new("a", "prompt").with_tool(ToolDescriptor::vector_search("kb", "faq"));
        let registry = ToolRegistry::build(&agent, &context()).unwrap();
        let tool = registry.resolve("kb").unwrap();

        let output = tool
            .invoke(&json!({ "query": "refunds", "top_k": 2 }), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(output["results"].as_array().unwrap().len(), 2);
        assert_eq!(output["results"][0]["content"], "faq:refunds:0");

        let defaulted = tool.invoke(&json!({ "query": "refunds" }), Duration::from_secs(1)).await.unwrap();
        assert_eq!(defaulted["results"].as_array().unwrap().len(), 5);

        let err = tool.invoke(&json!({}), Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_definitions_fall_back_when_server_unreachable() {
        let agent = AgentDefinition::new("a", "prompt")
            .with_tool(ToolDescriptor::remote("crm", "lookup"))
            .with_tool(ToolDescriptor::http("ticket", ticket_endpoint()));
        let registry = ToolRegistry::build(&agent, &context()).unwrap();

        let definitions = registry.tool_definitions().await;

        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].name, "lookup");
        assert_eq!(definitions[0].parameters, json!({ "type": "object" }));
        assert_eq!(definitions[1].parameters["required"], json!(["id"]));
    }
}
