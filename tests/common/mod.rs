// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use drive_courier::config::Config;
use drive_courier::db::Database;
use drive_courier::models::{Credentials, Session};
use drive_courier::services::limiter::DEFAULT_MAX_TRACKED_USERS;
use drive_courier::services::{
    AuthUser, DriveClient, GoogleAuthClient, LimiterRegistry, SessionStore, TokenManager,
    TransferService,
};
use drive_courier::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Spawn an axum router on a loopback port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve mock");
    });
    format!("http://{}", addr)
}

/// Spawn a raw TCP server that answers every request with a fixed HTTP
/// response. Used when the mock must control headers the framework would
/// rewrite (e.g. an oversized content-length).
#[allow(dead_code)]
pub async fn spawn_raw_server(response: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                // Give the client time to read the headers before we drop
                // the connection.
                tokio::time::sleep(Duration::from_millis(200)).await;
            });
        }
    });
    format!("http://{}", addr)
}

/// Accepts connections but never answers; for download timeout tests.
#[allow(dead_code)]
pub async fn spawn_stalled_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let _socket = socket;
                tokio::time::sleep(Duration::from_secs(600)).await;
            });
        }
    });
    format!("http://{}", addr)
}

/// Build shared state around an in-memory store and the given clients.
#[allow(dead_code)]
pub fn build_state(
    auth_client: GoogleAuthClient,
    drive: DriveClient,
    db: Database,
) -> Arc<AppState> {
    build_state_with_timeout(auth_client, drive, db, Duration::from_secs(2))
}

/// `build_state` with an explicit download timeout, for timeout tests.
#[allow(dead_code)]
pub fn build_state_with_timeout(
    auth_client: GoogleAuthClient,
    drive: DriveClient,
    db: Database,
    download_timeout: Duration,
) -> Arc<AppState> {
    let limiters = Arc::new(LimiterRegistry::new(DEFAULT_MAX_TRACKED_USERS));
    let transfer = TransferService::new(drive, db.clone(), limiters, download_timeout)
        .expect("transfer service");
    Arc::new(AppState {
        config: Config::test_default(),
        db: db.clone(),
        sessions: SessionStore::new(),
        auth: TokenManager::new(auth_client, db),
        transfer,
    })
}

/// Test app backed by the in-memory store; provider endpoints are never
/// contacted by these tests.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let auth_client = GoogleAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.redirect_uri.clone(),
    );
    let state = build_state(auth_client, DriveClient::new(), Database::new_memory());
    let router = drive_courier::routes::create_router(state.clone());
    (router, state)
}

#[allow(dead_code)]
pub fn test_credentials(expiry_date: i64, refresh_token: Option<&str>) -> Credentials {
    Credentials {
        access_token: "session_at".to_string(),
        refresh_token: refresh_token.map(|s| s.to_string()),
        expiry_date,
        token_type: Some("Bearer".to_string()),
        scope: None,
        id_token: None,
    }
}

#[allow(dead_code)]
pub fn test_session(google_id: &str, credentials: Credentials) -> Session {
    Session {
        google_id: google_id.to_string(),
        email: format!("{}@example.com", google_id),
        credentials,
    }
}

#[allow(dead_code)]
pub fn test_user(google_id: &str) -> AuthUser {
    AuthUser {
        google_id: google_id.to_string(),
        email: format!("{}@example.com", google_id),
        access_token: "session_at".to_string(),
    }
}
