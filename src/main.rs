mod config;
mod llm;
mod logging;
mod message;
mod rate_limit;
mod routes;
mod services;
mod state;
mod utils;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::llm::CanvasInterpreter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = config::AppConfig::from_env();
    logging::init(&config.log_level);

    let addr = config.bind_addr().expect("invalid bind address");

    // Initialize LLM client (non-fatal: AI assist disabled if config missing).
    let interpreter: Option<Arc<dyn CanvasInterpreter>> = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured, AI assist disabled");
            None
        }
    };

    let state = state::AppState::new(config, interpreter);

    // Spawn background housekeeping.
    let sweeper = services::sweeper::spawn_sweeper(state.clone());

    let app = routes::app(state.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "fastboard listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("server failed");

    sweeper.abort();
    tracing::info!("fastboard stopped");
}

/// Resolve on SIGINT or SIGTERM, after telling every connection to close.
async fn shutdown_signal(state: state::AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!(connections = state.hub.registry().count(), "shutdown signal received");
    state.begin_shutdown();
}
