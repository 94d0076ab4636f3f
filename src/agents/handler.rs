//! Agent handler: resolves an agent by id and runs it with the
//! process-owned collaborators

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::adapters::connection_pool::RemoteConnectionPool;
use crate::adapters::mcp_client::ToolCapability;
use crate::adapters::vector_search::HttpVectorSearch;
use crate::agents::config::{AgentDefinition, ExecutionSettings, LlmProviderConfig};
use crate::agents::core::{ExecutionResult, Orchestrator};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::{create_provider, LlmProvider};
use crate::agents::registry::ToolContext;
use crate::config::Settings;

/// Summary of a configured agent for listings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub id: String,
    pub description: String,
    pub tools: Vec<String>,
    pub llm_model: String,
    pub settings: ExecutionSettings,
}

/// Handler for agent operations
pub struct AgentHandler {
    settings: Arc<Settings>,
    tools: ToolContext,
    /// Cached LLM providers, keyed by the full model configuration
    providers: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
    /// Provider used for every agent regardless of configuration
    provider_override: Option<Arc<dyn LlmProvider>>,
}

impl AgentHandler {
    /// Build the remote pool and vector search backend from settings
    pub fn new(settings: Arc<Settings>) -> Self {
        let pool = RemoteConnectionPool::from_configs(&settings.remote_servers);
        let mut tools = ToolContext::new(Arc::new(pool));
        if let Some(config) = &settings.vector_search {
            tools = tools.with_vector_search(Arc::new(HttpVectorSearch::from_config(config)));
        }
        Self::with_tools(settings, tools)
    }

    pub fn with_tools(settings: Arc<Settings>, tools: ToolContext) -> Self {
        Self {
            settings,
            tools,
            providers: RwLock::new(HashMap::new()),
            provider_override: None,
        }
    }

    /// Route every agent to `provider` instead of its configured model
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider_override = Some(provider);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolContext {
        &self.tools
    }

    /// Connect every configured remote server up front
    pub async fn initialize(&self) {
        self.tools.remote.connect_all().await;
    }

    pub async fn execute(&self, agent_id: &str, input: Value) -> AgentResult<ExecutionResult> {
        let agent = self
            .settings
            .agent(agent_id)
            .ok_or_else(|| AgentError::NotFound(agent_id.to_string()))?;

        let provider = self.provider_for(agent).await?;
        Orchestrator::new(provider, self.tools.clone())
            .execute(agent, input)
            .await
    }

    pub fn list_agents(&self) -> Vec<AgentInfo> {
        self.settings
            .agents
            .iter()
            .map(|agent| AgentInfo {
                id: agent.id.clone(),
                description: agent.description.clone(),
                tools: agent.tools.iter().map(|t| t.name().to_string()).collect(),
                llm_model: self.settings.llm_for(agent).model,
                settings: agent.settings,
            })
            .collect()
    }

    pub fn get_agent(&self, agent_id: &str) -> Option<&AgentDefinition> {
        self.settings.agent(agent_id)
    }

    /// Capabilities advertised by a remote server, connecting if needed
    pub async fn remote_tools(&self, server_id: &str) -> AgentResult<Vec<ToolCapability>> {
        let client = self
            .tools
            .remote
            .get(server_id)
            .ok_or_else(|| AgentError::NotFound(format!("remote server '{}'", server_id)))?;

        client
            .list_tools()
            .await
            .map_err(|e| AgentError::Internal(e.to_string()))
    }

    async fn provider_for(&self, agent: &AgentDefinition) -> AgentResult<Arc<dyn LlmProvider>> {
        if let Some(provider) = &self.provider_override {
            return Ok(provider.clone());
        }

        let config = self.settings.llm_for(agent);
        let key = provider_key(&config);

        if let Some(provider) = self.providers.read().await.get(&key) {
            return Ok(provider.clone());
        }

        let provider = create_provider(&config).map_err(|e| AgentError::Configuration(e.to_string()))?;
        self.providers.write().await.insert(key, provider.clone());
        Ok(provider)
    }
}

/// Agents share a provider only when every setting that reaches the wire
/// (credentials, endpoint and sampling) is the same.
fn provider_key(config: &LlmProviderConfig) -> String {
    format!(
        "{}_{}_{}_{}_{:?}_{:?}",
        config.provider_type(),
        config.model,
        config.base_url.as_deref().unwrap_or(""),
        config.api_key_env.as_deref().unwrap_or(""),
        config.temperature,
        config.max_tokens
    )
}
