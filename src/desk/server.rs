use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState, SharedState};
use super::db::{DbHandle, DeskDb};
use crate::config::{AuthSection, PaginationSection};

/// Configuration for the help-desk server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub auth: AuthSection,
    pub pagination: PaginationSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3141,
            db_path: PathBuf::from(".helpdesk/helpdesk.db"),
            dev_mode: false,
            auth: AuthSection::default(),
            pagination: PaginationSection::default(),
        }
    }
}

/// Build the full application router with request tracing.
pub fn build_router(state: SharedState) -> Router {
    api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the database, creating its parent directory when needed.
pub fn open_database(path: &std::path::Path) -> Result<DeskDb> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    DeskDb::new(path).context("Failed to initialize help-desk database")
}

/// Start the help-desk server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let db = open_database(&config.db_path)?;
    let state = AppState::shared(DbHandle::new(db), config.auth, config.pagination);

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        address = %local_addr,
        db = %config.db_path.display(),
        dev_mode = config.dev_mode,
        "help-desk server listening"
    );
    println!("Help desk running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
    }
}
