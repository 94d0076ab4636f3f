use agentforge::agents::ToolDescriptor;
use agentforge::config::{RemoteAuthConfig, Settings};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_settings_and_external_agents() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    fs::create_dir_all(root.join("config/agents"))?;

    let main_toml = r#"
[server]
host = "0.0.0.0"
port = 8088

[llm]
provider = "openai"
model = "gpt-4o"

[[remote_servers]]
id = "crm"
url = "http://localhost:3001/mcp"
auth = { type = "bearer", token = "abc" }

[vector_search]
base_url = "http://localhost:6333"

[[agents]]
id = "support"
system_prompt = "You help customers."

[[agents.tools]]
type = "remote"
server_id = "crm"
tool_name = "lookup_customer"
"#;
    fs::write(root.join("agentforge.toml"), main_toml)?;

    let agent_yaml = r#"
id: researcher
system_prompt: You research {{ topic }}.
settings:
  max_iterations: 4
tools:
  - type: vector_search
    name: kb
    collection_id: papers
    top_k: 3
"#;
    fs::write(root.join("config/agents/researcher.yaml"), agent_yaml)?;

    let agent_json = r#"
{
    "id": "ticketing",
    "system_prompt": "You manage tickets.",
    "tools": [{
        "type": "http",
        "name": "get_ticket",
        "endpoint": {
            "method": "GET",
            "url_template": "https://api.example.com/tickets/{{id}}",
            "variables": [{ "name": "id", "kind": "number", "required": true }]
        }
    }]
}
"#;
    fs::write(root.join("config/agents/ticketing.json"), agent_json)?;
    fs::write(root.join("config/agents/notes.txt"), "ignored")?;

    let settings = Settings::from_root(root.to_str().unwrap())?;

    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 8088);
    assert_eq!(settings.llm.model, "gpt-4o");
    assert_eq!(settings.remote_servers.len(), 1);
    assert!(matches!(settings.remote_servers[0].auth, RemoteAuthConfig::Bearer { .. }));
    assert_eq!(settings.vector_search.as_ref().unwrap().default_top_k, 5);

    assert_eq!(settings.agents.len(), 3);
    let researcher = settings.agent("researcher").unwrap();
    assert_eq!(researcher.settings.max_iterations, 4);
    assert_eq!(researcher.settings.total_timeout_ms, 120_000);
    assert!(matches!(researcher.tools[0], ToolDescriptor::VectorSearch { top_k: 3, .. }));
    assert_eq!(settings.agent("ticketing").unwrap().tools[0].name(), "get_ticket");

    Ok(())
}

#[test]
fn test_defaults_without_config_file() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = Settings::from_root(temp_dir.path().to_str().unwrap())?;

    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 3000);
    assert!(settings.agents.is_empty());
    Ok(())
}

#[test]
fn test_invalid_references_are_reported_together() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    let main_toml = r#"
[server]
host = "127.0.0.1"
port = 3000

[[agents]]
id = "broken"
system_prompt = "x"

[agents.settings]
max_iterations = 0

[[agents.tools]]
type = "remote"
server_id = "missing"
tool_name = "lookup"

[[agents.tools]]
type = "vector_search"
name = "kb"
collection_id = "c"
"#;
    fs::write(root.join("agentforge.toml"), main_toml)?;

    let err = Settings::from_root(root.to_str().unwrap()).unwrap_err().to_string();
    assert!(err.contains("Configuration validation failed"));
    assert!(err.contains("max_iterations"));
    assert!(err.contains("missing"));
    assert!(err.contains("vector_search"));
    Ok(())
}
