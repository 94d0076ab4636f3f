use agentforge::agents::AgentHandler;
use agentforge::cli::{parse_input, Cli, Command};
use agentforge::config::Settings;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Arc::new(Settings::new_with_cli(&cli)?);
    info!(
        agents = settings.agents.len(),
        remote_servers = settings.remote_servers.len(),
        "Configuration loaded"
    );

    let handler = Arc::new(AgentHandler::new(settings.clone()));

    match cli.command() {
        Command::Serve => {
            handler.initialize().await;

            let app = agentforge::create_app(handler);
            let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
            info!("Listening on {}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Command::Run { agent, input } => {
            let result = handler.execute(&agent, parse_input(&input)).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
