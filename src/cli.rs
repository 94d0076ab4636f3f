use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AgentForge - agent execution engine with concurrent tool dispatch
#[derive(Parser, Debug, Clone)]
#[command(name = "agentforge", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "AGENTFORGE_CONFIG", default_value = "agentforge.toml")]
    pub config: PathBuf,

    /// Server host address
    #[arg(long, env = "AGENTFORGE_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, env = "AGENTFORGE_PORT")]
    pub port: Option<u16>,

    /// Override the default model for agents without their own
    #[arg(long, env = "AGENTFORGE_MODEL")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the REST API (default)
    Serve,
    /// Execute one agent and print the execution payload as JSON
    Run {
        /// Agent id
        #[arg(short, long)]
        agent: String,
        /// Input payload as JSON; plain text is sent as the message
        #[arg(short, long, default_value = "{}")]
        input: String,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

/// Parse `--input`: JSON when it parses, otherwise `{"message": <text>}`
pub fn parse_input(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::json!({ "message": raw }))
}
