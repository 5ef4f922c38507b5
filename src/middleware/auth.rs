// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication middleware.
//!
//! An unauthenticated or unrecoverable session is answered with a redirect
//! to the consent screen, never an error payload; only explicit user
//! consent can mint a new refresh token.

use crate::services::google_auth::AuthDecision;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "courier_session";

/// 302 Found redirect. The OAuth flow replies 302, which browsers follow
/// with a GET regardless of the original method.
pub fn redirect_found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Middleware guaranteeing a usable access token before the handler runs.
/// On success an `AuthUser` extension is attached to the request.
pub async fn ensure_authenticated(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        tracing::info!("No session cookie, redirecting to consent");
        return redirect_found(&state.auth.consent_url(true));
    };

    match state
        .auth
        .ensure_authenticated(&state.sessions, cookie.value())
        .await
    {
        Ok(AuthDecision::Authenticated(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(AuthDecision::ConsentRequired { url, .. }) => redirect_found(&url),
        Err(e) => e.into_response(),
    }
}
