//! HTTP server command - `helpdesk serve`.

use anyhow::Result;

use helpdesk::config::HelpdeskConfig;
use helpdesk::desk::server::{ServerConfig, start_server};

pub async fn cmd_serve(config: &HelpdeskConfig) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!(%warning, "configuration warning");
    }

    let toml = &config.toml;
    start_server(ServerConfig {
        host: toml.server.host.clone(),
        port: toml.server.port,
        db_path: config.db_path(),
        dev_mode: toml.server.dev_mode,
        auth: toml.auth.clone(),
        pagination: toml.pagination,
    })
    .await
}
