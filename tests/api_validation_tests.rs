// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route-level validation and session-guard tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Utc;
use drive_courier::middleware::auth::SESSION_COOKIE;
use tower::ServiceExt;

mod common;

fn live_session_cookie(state: &drive_courier::AppState) -> String {
    let expiry = Utc::now().timestamp_millis() + 3_600_000;
    let session = common::test_session("u1", common::test_credentials(expiry, Some("rt1")));
    let sid = state.sessions.insert(session);
    format!("{}={}", SESSION_COOKIE, sid)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_upload_without_session_redirects_to_consent() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/upload-files")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"urls":["https://example.com/a.txt"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    // The OAuth flow answers 302 Found, never an error payload.
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .expect("redirect location")
        .to_str()
        .unwrap();
    assert!(location.contains("prompt=consent"));
}

#[tokio::test]
async fn test_upload_rejects_empty_url_list() {
    let (app, state) = common::create_test_app();
    let cookie = live_session_cookie(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/upload-files")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"urls":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"], "Provide an array of URLs");
}

#[tokio::test]
async fn test_upload_rejects_missing_url_field() {
    let (app, state) = common::create_test_app();
    let cookie = live_session_cookie(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/upload-files")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_requires_authorization_code() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/google/callback")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"], "Authorization code is required");
}

#[tokio::test]
async fn test_callback_rejects_empty_code() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/google/callback?code=")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_uploaded_files_empty_for_new_user() {
    let (app, state) = common::create_test_app();
    let cookie = live_session_cookie(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/get-uploaded-files")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["files"], serde_json::json!([]));
}
