//! Main Entrypoint for the Parley API Service
//!
//! 1. Loads configuration from the environment.
//! 2. Prepares the data directory and the fraud case database.
//! 3. Builds the language model client when a provider key is present.
//! 4. Serves the router with CORS and graceful shutdown.

use anyhow::Context;
use parley_api::{config::Config, router::create_router, state::AppState};
use parley_demos::{DemoContext, init_fraud_db};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Prepare Storage ---
    let ctx = DemoContext::from(&config);
    std::fs::create_dir_all(&ctx.data_dir)
        .with_context(|| format!("Failed to create {}", ctx.data_dir.display()))?;
    if init_fraud_db(&ctx).await? {
        info!(path = %ctx.fraud_db_path.display(), "Seeded sample fraud case.");
    }

    // --- 4. Language Model ---
    let llm_client = match config.llm_client() {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "No language model configured; only scripted demos will start.");
            None
        }
    };

    let app_state = Arc::new(AppState { ctx, llm_client });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
