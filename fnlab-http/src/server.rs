use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use fnlab_core::{SecretConfig, SystemConfig, Workbench, scratch::ScratchSpace};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::routes::create_api_router;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Largest accepted request body, uploads included
    pub max_body_bytes: usize,

    /// System configuration
    pub system_config: Option<SystemConfig>,

    /// Secret configuration
    pub secret_config: Option<SecretConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_body_bytes: 16 * 1024 * 1024,
            system_config: None,
            secret_config: None,
        }
    }
}

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub workbench: Arc<Workbench>,
    pub scratch: Arc<ScratchSpace>,
}

impl AppState {
    pub fn new(system_config: &SystemConfig, secret_config: &SecretConfig) -> std::io::Result<Self> {
        Ok(Self::with_workbench(
            Workbench::from_config(system_config, secret_config),
            ScratchSpace::new(&system_config.scratch.root)?,
        ))
    }

    pub fn with_workbench(workbench: Workbench, scratch: ScratchSpace) -> Self {
        Self {
            workbench: Arc::new(workbench),
            scratch: Arc::new(scratch),
        }
    }
}

/// Router with state and the HTTP layers applied.
pub fn build_app(state: AppState, max_body_bytes: usize) -> Router {
    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_api_router()
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let system_config = config.system_config.unwrap_or_default();
    let secret_config = config.secret_config.unwrap_or_default();
    if !secret_config.has_api_key() {
        warn!("No API key configured; every analysis will use the fallback result");
    }

    let state = AppState::new(&system_config, &secret_config)?;
    info!(
        transformer = state.workbench.transformer_name(),
        scratch = %state.scratch.root().display(),
        "Initialized workbench"
    );

    let app = build_app(state, config.max_body_bytes);

    // Parse the socket address
    let addr = format!("{}:{}", config.host, config.port).parse::<SocketAddr>()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
