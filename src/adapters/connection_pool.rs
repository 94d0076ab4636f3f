use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::mcp_client::{ConnectionState, RemoteToolClient};
use crate::config::RemoteServerConfig;

/// Process-wide set of remote clients, one per configured server.
///
/// Clients are shared by every execution referencing the server; the pool is
/// built once at startup and handed to whatever needs it.
#[derive(Default)]
pub struct RemoteConnectionPool {
    clients: HashMap<String, Arc<RemoteToolClient>>,
}

impl RemoteConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for every enabled server. Servers whose credentials
    /// cannot be resolved are skipped with a warning.
    pub fn from_configs(configs: &[RemoteServerConfig]) -> Self {
        let mut pool = Self::new();
        for config in configs.iter().filter(|c| c.enabled) {
            match RemoteToolClient::from_config(config) {
                Ok(client) => pool.insert(Arc::new(client)),
                Err(e) => warn!(server = %config.id, error = %e, "Skipping remote server"),
            }
        }
        pool
    }

    pub fn insert(&mut self, client: Arc<RemoteToolClient>) {
        self.clients.insert(client.server_id().to_string(), client);
    }

    pub fn get(&self, server_id: &str) -> Option<Arc<RemoteToolClient>> {
        self.clients.get(server_id).cloned()
    }

    pub fn contains(&self, server_id: &str) -> bool {
        self.clients.contains_key(server_id)
    }

    pub fn server_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn states(&self) -> Vec<(String, ConnectionState)> {
        self.server_ids()
            .into_iter()
            .filter_map(|id| self.clients.get(&id).map(|c| (id, c.state())))
            .collect()
    }

    /// Connect every client up front. Failures are logged; the client will
    /// retry the handshake on first use.
    pub async fn connect_all(&self) {
        for (id, client) in &self.clients {
            match client.connect().await {
                Ok(tools) => info!(server = %id, tools = tools.len(), "Remote server ready"),
                Err(e) => warn!(server = %id, error = %e, "Remote server not reachable at startup"),
            }
        }
    }
}
