use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use helpdesk_rag::core::config::{AppPaths, ConfigService};
use helpdesk_rag::core::logging;
use helpdesk_rag::server;
use helpdesk_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let config = ConfigService::new(paths.clone())
        .load()
        .context("Failed to load configuration")?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::initialize(paths, config).await?;

    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            state.shutdown().await;
            return Err(err).with_context(|| format!("Failed to bind to {}", bind_addr));
        }
    };
    let addr = listener.local_addr()?;

    println!("HELPDESK_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    tracing::info!("Shutting down");
    state.shutdown().await;
    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
