use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::adapters::http_executor::CompiledEndpoint;
use crate::agents::config::{AgentDefinition, ToolDescriptor};
use crate::config::{RemoteServerConfig, Settings};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cross-reference error: {0}")]
    CrossReference(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_server(&settings.server) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_remote_servers(&settings.remote_servers) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_agents(&settings.agents) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_cross_references(settings) {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &crate::config::ServerSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_remote_servers(servers: &[RemoteServerConfig]) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut seen_ids = HashMap::new();

        for (idx, server) in servers.iter().enumerate() {
            if let Some(prev_idx) = seen_ids.insert(&server.id, idx) {
                errors.push(ValidationError::Duplicate(format!(
                    "Remote server id '{}' appears at indices {} and {}",
                    server.id, prev_idx, idx
                )));
            }

            if server.id.is_empty() {
                errors.push(ValidationError::MissingField(format!("remote_servers[{}].id", idx)));
            }

            if server.url.is_empty() {
                errors.push(ValidationError::MissingField(format!("remote_servers[{}].url", idx)));
            }

            if server.handshake_timeout_ms == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: format!("remote_servers[{}].handshake_timeout_ms", idx),
                    reason: "Timeout must be greater than 0".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_agents(agents: &[AgentDefinition]) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut seen_ids = HashMap::new();

        for (idx, agent) in agents.iter().enumerate() {
            if let Some(prev_idx) = seen_ids.insert(&agent.id, idx) {
                errors.push(ValidationError::Duplicate(format!(
                    "Agent id '{}' appears at indices {} and {}",
                    agent.id, prev_idx, idx
                )));
            }

            if agent.id.is_empty() {
                errors.push(ValidationError::MissingField(format!("agents[{}].id", idx)));
            }

            if agent.settings.max_iterations == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: format!("agents[{}].settings.max_iterations", idx),
                    reason: "At least one iteration is required".to_string(),
                });
            }

            if agent.settings.total_timeout_ms == 0 || agent.settings.per_call_timeout_ms == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: format!("agents[{}].settings", idx),
                    reason: "Timeouts must be greater than 0".to_string(),
                });
            }

            let mut tool_names = HashSet::new();
            for (tool_idx, tool) in agent.tools.iter().enumerate() {
                let field = format!("agents[{}].tools[{}]", idx, tool_idx);

                if tool.name().is_empty() {
                    errors.push(ValidationError::MissingField(format!("{}.name", field)));
                }

                if !tool_names.insert(tool.name()) {
                    errors.push(ValidationError::Duplicate(format!(
                        "Tool name '{}' registered twice for agent '{}'",
                        tool.name(),
                        agent.id
                    )));
                }

                if let ToolDescriptor::Http { endpoint, .. } = tool {
                    if let Err(e) = CompiledEndpoint::compile(endpoint.clone()) {
                        errors.push(ValidationError::InvalidValue {
                            field: format!("{}.endpoint", field),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_cross_references(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let server_ids: HashSet<&str> = settings.remote_servers.iter().map(|s| s.id.as_str()).collect();

        for agent in &settings.agents {
            for tool in &agent.tools {
                match tool {
                    ToolDescriptor::Remote { server_id, .. } if !server_ids.contains(server_id.as_str()) => {
                        errors.push(ValidationError::CrossReference(format!(
                            "Agent '{}' tool '{}' references unknown remote server '{}'",
                            agent.id,
                            tool.name(),
                            server_id
                        )));
                    }
                    ToolDescriptor::VectorSearch { .. } if settings.vector_search.is_none() => {
                        errors.push(ValidationError::CrossReference(format!(
                            "Agent '{}' tool '{}' needs a vector_search section",
                            agent.id,
                            tool.name()
                        )));
                    }
                    _ => {}
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
