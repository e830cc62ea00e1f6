//! HTTP server implementation using Axum.

use crate::handler::{handle_health, handle_rpc};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use callwire_core::{ServerConfig, ServiceRouter};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    pub router: ServiceRouter,
}

/// Listener and limits for the HTTP host.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    /// 0 picks a free port.
    pub port: u16,
    pub max_concurrent: usize,
    pub body_limit: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: ServerConfig::DEFAULT_HOST.to_string(),
            port: 0,
            max_concurrent: ServerConfig::DEFAULT_MAX_CONCURRENT_CALLS,
            body_limit: ServerConfig::MAX_REQUEST_BODY_BYTES,
        }
    }
}

/// Build the axum application around a service router.
pub fn build_app(router: ServiceRouter, options: &ServerOptions) -> Router {
    let state = Arc::new(AppState { router });

    // Configure CORS for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(ServerConfig::HEALTH_PATH, get(handle_health))
        .route(ServerConfig::ENDPOINT_PATH, post(handle_rpc))
        .layer(DefaultBodyLimit::max(options.body_limit))
        .layer(ConcurrencyLimitLayer::new(options.max_concurrent.max(1)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(router: ServiceRouter, options: &ServerOptions) -> anyhow::Result<SocketAddr> {
    let app = build_app(router, options);

    let addr: SocketAddr = format!("{}:{}", options.host, options.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
