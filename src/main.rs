// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Drive-Courier API Server
//!
//! Lets an authenticated user submit a batch of URLs; each resource is
//! downloaded and streamed into their Google Drive, with per-user rate
//! limiting and automatic OAuth token refresh.

use drive_courier::{
    config::Config,
    db::Database,
    services::{
        limiter::DEFAULT_MAX_TRACKED_USERS, DriveClient, GoogleAuthClient, LimiterRegistry,
        SessionStore, TokenManager, TransferService,
    },
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Drive-Courier API");

    // Connect to Postgres and create the schema if needed
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    // Token lifecycle manager with its live-client registry
    let google_auth = GoogleAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.redirect_uri.clone(),
    );
    let auth = TokenManager::new(google_auth, db.clone());
    tracing::info!("Token lifecycle manager initialized");

    // Per-user rate limiter registry, shared by uploads and listings
    let limiters = Arc::new(LimiterRegistry::new(DEFAULT_MAX_TRACKED_USERS));

    // Transfer pipeline
    let transfer = TransferService::new(
        DriveClient::new(),
        db.clone(),
        limiters,
        Duration::from_millis(config.download_timeout_ms),
    )
    .expect("Failed to build transfer pipeline");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db: db.clone(),
        sessions: SessionStore::new(),
        auth,
        transfer,
    });

    // Build router
    let app = drive_courier::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server closed, shutting down database pool");
    db.close().await;
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received, closing HTTP server"),
        _ = terminate => tracing::info!("SIGTERM received, closing HTTP server"),
    }
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drive_courier=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
