pub mod auth;
pub mod routes;

use crate::core::engine::ScrapeEngine;
use crate::utils::error::Result;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScrapeEngine>,
    pub api_token: String,
}

impl AppState {
    pub fn new(engine: ScrapeEngine, api_token: String) -> Self {
        Self {
            engine: Arc::new(engine),
            api_token,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/scrape", post(routes::scrape))
        .route("/healthz", get(routes::healthz))
        .with_state(state)
}

/// Bind on 0.0.0.0 and serve until SIGINT/SIGTERM.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("🌐 Listening on http://{}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
