// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle tests: refresh, re-consent decisions, and the OAuth
//! callback, against a mock provider.

use axum::extract::Form;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use drive_courier::db::Database;
use drive_courier::services::google_auth::{AuthDecision, ConsentReason};
use drive_courier::services::{DriveClient, GoogleAuthClient};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

mod common;

fn auth_client(base: &str) -> GoogleAuthClient {
    GoogleAuthClient::new(
        "cid".to_string(),
        "secret".to_string(),
        "http://localhost:8080/auth/google/callback".to_string(),
    )
    .with_endpoints(
        &format!("{base}/auth"),
        &format!("{base}/token"),
        &format!("{base}/userinfo"),
    )
}

fn expired_ms() -> i64 {
    Utc::now().timestamp_millis() - 1_000
}

#[tokio::test]
async fn test_expired_session_is_refreshed_exactly_once() {
    let token_calls = Arc::new(AtomicUsize::new(0));
    let calls = token_calls.clone();
    let provider = Router::new().route(
        "/token",
        post(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                // Google omits the refresh token on refresh grants.
                Json(json!({ "access_token": "fresh_at", "expires_in": 3600 }))
            }
        }),
    );
    let base = common::spawn_server(provider).await;
    let state = common::build_state(auth_client(&base), DriveClient::new(), Database::new_memory());

    let session = common::test_session("u1", common::test_credentials(expired_ms(), Some("rt1")));
    let sid = state.sessions.insert(session);

    let decision = state
        .auth
        .ensure_authenticated(&state.sessions, &sid)
        .await
        .unwrap();
    let AuthDecision::Authenticated(user) = decision else {
        panic!("expected authenticated decision");
    };
    assert_eq!(user.access_token, "fresh_at");
    assert_eq!(token_calls.load(Ordering::SeqCst), 1);

    // The session now carries the fresh token, so the next request must
    // not hit the provider again.
    let decision = state
        .auth
        .ensure_authenticated(&state.sessions, &sid)
        .await
        .unwrap();
    assert!(matches!(decision, AuthDecision::Authenticated(_)));
    assert_eq!(token_calls.load(Ordering::SeqCst), 1);

    // Persisted credentials keep the previous refresh token.
    let stored = state.db.get_credentials("u1").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "fresh_at");
    assert_eq!(stored.refresh_token.as_deref(), Some("rt1"));
}

#[tokio::test]
async fn test_stored_refresh_token_used_when_session_lacks_one() {
    let seen_refresh_token = Arc::new(Mutex::new(None::<String>));
    let seen = seen_refresh_token.clone();
    let provider = Router::new().route(
        "/token",
        post(move |Form(params): Form<HashMap<String, String>>| {
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = params.get("refresh_token").cloned();
                Json(json!({ "access_token": "fresh_at", "expires_in": 3600 }))
            }
        }),
    );
    let base = common::spawn_server(provider).await;
    let state = common::build_state(auth_client(&base), DriveClient::new(), Database::new_memory());

    state
        .db
        .upsert_credentials("u1", &common::test_credentials(expired_ms(), Some("stored_rt")))
        .await
        .unwrap();
    let session = common::test_session("u1", common::test_credentials(expired_ms(), None));
    let sid = state.sessions.insert(session);

    let decision = state
        .auth
        .ensure_authenticated(&state.sessions, &sid)
        .await
        .unwrap();
    assert!(matches!(decision, AuthDecision::Authenticated(_)));
    assert_eq!(
        seen_refresh_token.lock().unwrap().as_deref(),
        Some("stored_rt")
    );
}

#[tokio::test]
async fn test_no_refresh_token_anywhere_requires_consent() {
    let token_calls = Arc::new(AtomicUsize::new(0));
    let calls = token_calls.clone();
    let provider = Router::new().route(
        "/token",
        post(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "access_token": "fresh_at" }))
            }
        }),
    );
    let base = common::spawn_server(provider).await;
    let state = common::build_state(auth_client(&base), DriveClient::new(), Database::new_memory());

    let session = common::test_session("u1", common::test_credentials(expired_ms(), None));
    let sid = state.sessions.insert(session);

    let decision = state
        .auth
        .ensure_authenticated(&state.sessions, &sid)
        .await
        .unwrap();
    let AuthDecision::ConsentRequired { url, reason } = decision else {
        panic!("expected consent redirect");
    };
    assert_eq!(reason, ConsentReason::NeverAuthenticated);
    assert!(url.contains("prompt=consent"));
    assert_eq!(token_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_refresh_failure_requires_consent() {
    let provider = Router::new().route(
        "/token",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = common::spawn_server(provider).await;
    let state = common::build_state(auth_client(&base), DriveClient::new(), Database::new_memory());

    let session = common::test_session("u1", common::test_credentials(expired_ms(), Some("rt1")));
    let sid = state.sessions.insert(session);

    let decision = state
        .auth
        .ensure_authenticated(&state.sessions, &sid)
        .await
        .unwrap();
    let AuthDecision::ConsentRequired { reason, .. } = decision else {
        panic!("expected consent redirect");
    };
    assert_eq!(reason, ConsentReason::RefreshFailed);
}

#[tokio::test]
async fn test_unknown_session_requires_consent() {
    let (_, state) = common::create_test_app();

    let decision = state
        .auth
        .ensure_authenticated(&state.sessions, "no-such-session")
        .await
        .unwrap();
    let AuthDecision::ConsentRequired { reason, .. } = decision else {
        panic!("expected consent redirect");
    };
    assert_eq!(reason, ConsentReason::NoSession);
}

#[tokio::test]
async fn test_callback_establishes_session_and_persists() {
    let provider = Router::new()
        .route(
            "/token",
            post(|| async {
                Json(json!({
                    "access_token": "at0",
                    "refresh_token": "rt0",
                    "expires_in": 3600,
                    "token_type": "Bearer"
                }))
            }),
        )
        .route(
            "/userinfo",
            get(|| async { Json(json!({ "id": "u9", "email": "u9@example.com" })) }),
        );
    let base = common::spawn_server(provider).await;
    let state = common::build_state(auth_client(&base), DriveClient::new(), Database::new_memory());

    let session = state.auth.complete_auth_callback("code123").await.unwrap();
    assert_eq!(session.google_id, "u9");
    assert_eq!(session.email, "u9@example.com");
    assert_eq!(session.credentials.access_token, "at0");

    let user = state.db.get_user("u9").await.unwrap().unwrap();
    assert_eq!(user.email, "u9@example.com");

    let stored = state.db.get_credentials("u9").await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("rt0"));
    assert!(stored.expiry_date > Utc::now().timestamp_millis());
}

#[tokio::test]
async fn test_callback_missing_email_is_an_error() {
    let provider = Router::new()
        .route(
            "/token",
            post(|| async { Json(json!({ "access_token": "at0", "expires_in": 3600 })) }),
        )
        .route("/userinfo", get(|| async { Json(json!({ "id": "u9" })) }));
    let base = common::spawn_server(provider).await;
    let state = common::build_state(auth_client(&base), DriveClient::new(), Database::new_memory());

    let err = state
        .auth
        .complete_auth_callback("code123")
        .await
        .expect_err("callback must fail without an email");
    assert!(err
        .to_string()
        .contains("Missing user id or email in provider response"));
}
