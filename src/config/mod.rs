use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod validator;

use crate::agents::config::{AgentDefinition, LlmProviderConfig};
use crate::cli::Cli;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerSettings,
    /// Default model used by agents without their own `llm` section
    #[serde(default)]
    pub llm: LlmProviderConfig,
    /// Remote capability servers tools may be bound to
    #[serde(default)]
    pub remote_servers: Vec<RemoteServerConfig>,
    /// Vector-knowledge service backing `vector_search` tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search: Option<VectorSearchConfig>,
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Connection settings for one remote capability server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteServerConfig {
    /// Unique server id referenced by `remote` tools
    pub id: String,
    /// JSON-RPC endpoint (e.g., "http://localhost:3001/mcp")
    pub url: String,
    #[serde(default)]
    pub auth: RemoteAuthConfig,
    /// Whether this server is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Timeout for the handshake and capability discovery
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

/// Credentials presented to a remote server.
///
/// Secrets may be given inline or through an environment variable; the
/// variable wins when both are set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteAuthConfig {
    #[default]
    None,
    Bearer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_env: Option<String>,
    },
    ApiKey {
        #[serde(default = "default_api_key_header", alias = "header")]
        header_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_env: Option<String>,
    },
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

impl RemoteAuthConfig {
    /// Resolve the credential into request headers.
    pub fn headers(&self) -> Result<Vec<(String, String)>, String> {
        match self {
            RemoteAuthConfig::None => Ok(Vec::new()),
            RemoteAuthConfig::Bearer { token, token_env } => {
                let token = resolve_secret(token, token_env, "bearer token")?;
                Ok(vec![("Authorization".to_string(), format!("Bearer {}", token))])
            }
            RemoteAuthConfig::ApiKey {
                header_name,
                key,
                key_env,
            } => {
                let key = resolve_secret(key, key_env, "api key")?;
                Ok(vec![(header_name.clone(), key)])
            }
        }
    }
}

fn resolve_secret(
    inline: &Option<String>,
    env_var: &Option<String>,
    what: &str,
) -> Result<String, String> {
    if let Some(var) = env_var {
        if let Ok(value) = std::env::var(var) {
            return Ok(value);
        }
        if inline.is_none() {
            return Err(format!("environment variable {} for {} is not set", var, what));
        }
    }
    inline
        .clone()
        .ok_or_else(|| format!("no {} configured", what))
}

/// Vector-knowledge service endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorSearchConfig {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

fn default_top_k() -> usize {
    5
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_root(".")
    }

    /// Create settings from CLI arguments (config file, env vars, CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let config_path = &cli.config;
        let root = config_path
            .parent()
            .and_then(|p| p.to_str())
            .filter(|p| !p.is_empty())
            .unwrap_or(".");

        let mut settings = Self::load(config_path)?;

        // CLI > env vars > config file
        settings.apply_cli_overrides(cli);

        settings.load_external_configs(root)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_root(root: &str) -> Result<Self, anyhow::Error> {
        let config_path = Path::new(root).join("agentforge");
        let mut settings = Self::load(&config_path)?;
        settings.load_external_configs(root)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(config_path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .add_source(File::from(config_path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("AGENTFORGE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .build()?;

        Ok(s.try_deserialize()?)
    }

    /// Apply CLI argument overrides to settings
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(model) = &cli.model {
            self.llm.model = model.clone();
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }

    fn load_external_configs(&mut self, root: &str) -> Result<(), anyhow::Error> {
        self.load_agents_from_dir(&format!("{}/config/agents", root))
    }

    fn load_agents_from_dir(&mut self, path: &str) -> Result<(), anyhow::Error> {
        let pattern = format!("{}/*", path);
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) => {
                    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                        if matches!(ext, "json" | "yaml" | "yml" | "toml") {
                            let content = std::fs::read_to_string(&path)?;
                            let agent: AgentDefinition = match ext {
                                "json" => serde_json::from_str(&content)?,
                                "toml" => toml::from_str(&content)?,
                                _ => serde_yaml::from_str(&content)?,
                            };
                            tracing::debug!(agent = %agent.id, path = %path.display(), "Loaded agent definition");
                            self.agents.push(agent);
                        }
                    }
                }
                Err(e) => tracing::warn!("Failed to read glob entry: {}", e),
            }
        }
        Ok(())
    }

    pub fn agent(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Model settings for an agent: its own override or the global default
    pub fn llm_for(&self, agent: &AgentDefinition) -> LlmProviderConfig {
        agent.llm.clone().unwrap_or_else(|| self.llm.clone())
    }
}
