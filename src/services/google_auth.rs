// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth2 client and token lifecycle management.
//!
//! `GoogleAuthClient` speaks the raw OAuth2 endpoints (consent URL, code
//! exchange, refresh, userinfo). `TokenManager` owns the per-user live
//! client registry and decides, per request, whether to trust the session,
//! refresh credentials, or redirect to consent.

use crate::db::Database;
use crate::error::AppError;
use crate::models::{Credentials, Session, UserIdentity};
use crate::services::session::SessionStore;
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested at consent: Drive access plus the user's email.
const OAUTH_SCOPES: &str =
    "https://www.googleapis.com/auth/drive https://www.googleapis.com/auth/userinfo.email";

/// Lifetime assumed for tokens whose response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Raw OAuth2 + userinfo HTTP client.
#[derive(Clone)]
pub struct GoogleAuthClient {
    http: reqwest::Client,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleAuthClient {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    /// Point the client at alternate endpoints (tests).
    pub fn with_endpoints(
        mut self,
        auth_url: &str,
        token_url: &str,
        userinfo_url: &str,
    ) -> Self {
        self.auth_url = auth_url.to_string();
        self.token_url = token_url.to_string();
        self.userinfo_url = userinfo_url.to_string();
        self
    }

    /// Build the consent-screen URL. `force_consent` adds `prompt=consent`,
    /// which makes Google mint a fresh refresh token.
    pub fn consent_url(&self, force_consent: bool) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&access_type=offline&scope={}{}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(OAUTH_SCOPES),
            if force_consent { "&prompt=consent" } else { "" },
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<Credentials, AppError> {
        self.post_token(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    /// Refresh an expired access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Credentials, AppError> {
        self.post_token(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    /// Fetch the authenticated user's id and email.
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<UserInfo, AppError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::OAuth(format!("Userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::OAuth(format!("Userinfo HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::OAuth(format!("Failed to parse userinfo: {}", e)))
    }

    async fn post_token(&self, params: &[(&str, &str)]) -> Result<Credentials, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::OAuth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::OAuth(format!("Token HTTP {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::OAuth(format!("Failed to parse token response: {}", e)))?;

        Ok(token.into_credentials())
    }
}

/// Token endpoint response. `expires_in` is seconds from now; credentials
/// carry an absolute epoch-millisecond expiry instead.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    id_token: Option<String>,
}

impl TokenResponse {
    fn into_credentials(self) -> Credentials {
        let lifetime = self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expiry_date: Utc::now().timestamp_millis() + lifetime * 1000,
            token_type: self.token_type,
            scope: self.scope,
            id_token: self.id_token,
        }
    }
}

/// Userinfo endpoint response.
#[derive(Debug, Deserialize)]
pub struct UserInfo {
    pub id: Option<String>,
    pub email: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// TokenManager - per-user credential lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Authenticated user attached to requests by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub google_id: String,
    pub email: String,
    pub access_token: String,
}

/// Why a consent redirect was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentReason {
    NoSession,
    NeverAuthenticated,
    NoRefreshToken,
    RefreshFailed,
}

/// Outcome of `ensure_authenticated`: proceed, or send the user to the
/// consent screen. A redirect is the only recovery path when no refresh
/// token is viable; only explicit consent can mint a new one.
#[derive(Debug)]
pub enum AuthDecision {
    Authenticated(AuthUser),
    ConsentRequired { url: String, reason: ConsentReason },
}

/// Cap on users with live in-process auth state. An evicted user falls
/// back to the persisted credentials on their next request.
const MAX_LIVE_CLIENTS: usize = 4096;

struct LiveCredentials {
    credentials: Credentials,
    last_used: AtomicU64,
}

/// Owns one live OAuth2 client per authenticated user and drives the
/// trust / refresh / re-consent decision for every request.
pub struct TokenManager {
    client: GoogleAuthClient,
    db: Database,
    /// Live credentials per user, bounded by LRU eviction. Entries are
    /// replaced wholesale when credentials rotate, never mutated across an
    /// await point.
    clients: DashMap<String, LiveCredentials>,
    /// Per-user mutex so concurrent requests trigger exactly one refresh.
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
    max_live_clients: usize,
    clock: AtomicU64,
}

impl TokenManager {
    pub fn new(client: GoogleAuthClient, db: Database) -> Self {
        Self::with_capacity(client, db, MAX_LIVE_CLIENTS)
    }

    fn with_capacity(client: GoogleAuthClient, db: Database, max_live_clients: usize) -> Self {
        Self {
            client,
            db,
            clients: DashMap::new(),
            refresh_locks: DashMap::new(),
            max_live_clients,
            clock: AtomicU64::new(0),
        }
    }

    /// The consent-screen URL for redirects issued outside the manager.
    pub fn consent_url(&self, force_consent: bool) -> String {
        self.client.consent_url(force_consent)
    }

    /// Guarantee a usable access token for the session, refreshing or
    /// prompting re-consent as needed.
    pub async fn ensure_authenticated(
        &self,
        sessions: &SessionStore,
        session_id: &str,
    ) -> Result<AuthDecision, AppError> {
        let Some(session) = sessions.get(session_id) else {
            return Ok(self.consent_required(ConsentReason::NoSession));
        };

        let now = Utc::now();
        if !session.credentials.is_expired(now) {
            return Ok(AuthDecision::Authenticated(auth_user(&session)));
        }

        // Another request on this process may have already refreshed.
        if let Some(updated) = self.adopt_live_client(sessions, session_id, &session) {
            return Ok(AuthDecision::Authenticated(updated));
        }

        let lock = self
            .refresh_locks
            .entry(session.google_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check after acquiring the lock: a concurrent request may have
        // finished the refresh while we waited.
        if let Some(updated) = self.adopt_live_client(sessions, session_id, &session) {
            return Ok(AuthDecision::Authenticated(updated));
        }

        // Resolve a refresh token: session first, then persisted credentials.
        let previous = match &session.credentials.refresh_token {
            Some(_) => session.credentials.clone(),
            None => match self.db.get_credentials(&session.google_id).await? {
                Some(stored) if stored.refresh_token.is_some() => stored,
                Some(_) => {
                    return Ok(self.consent_required(ConsentReason::NoRefreshToken));
                }
                None => {
                    return Ok(self.consent_required(ConsentReason::NeverAuthenticated));
                }
            },
        };
        let Some(refresh_token) = previous.refresh_token.clone() else {
            return Ok(self.consent_required(ConsentReason::NoRefreshToken));
        };

        match self.client.refresh(&refresh_token).await {
            Ok(fresh) => {
                let merged = fresh.merged_with_previous(&previous);
                self.register_live_client(&session.google_id, merged.clone());
                self.db
                    .upsert_credentials(&session.google_id, &merged)
                    .await?;

                let updated = Session {
                    google_id: session.google_id.clone(),
                    email: session.email.clone(),
                    credentials: merged,
                };
                sessions.save(session_id, updated.clone());

                tracing::info!(google_id = %session.google_id, "Access token refreshed");
                Ok(AuthDecision::Authenticated(auth_user(&updated)))
            }
            Err(e) => {
                tracing::warn!(
                    google_id = %session.google_id,
                    error = %e,
                    "Token refresh failed, consent required"
                );
                Ok(self.consent_required(ConsentReason::RefreshFailed))
            }
        }
    }

    /// Handle the OAuth callback: exchange the code, fetch the identity,
    /// persist both, register the live client, and return the session to
    /// establish.
    pub async fn complete_auth_callback(&self, code: &str) -> Result<Session, AppError> {
        let credentials = self.client.exchange_code(code).await?;
        let info = self.client.fetch_userinfo(&credentials.access_token).await?;

        let (google_id, email) = match (info.id, info.email) {
            (Some(id), Some(email)) if !id.is_empty() && !email.is_empty() => (id, email),
            _ => {
                // Provider contract violation; fatal for this request.
                return Err(AppError::OAuth(
                    "Missing user id or email in provider response".to_string(),
                ));
            }
        };

        let user = UserIdentity {
            google_id: google_id.clone(),
            email: email.clone(),
        };
        self.db.upsert_user(&user).await?;
        self.db.upsert_credentials(&google_id, &credentials).await?;
        self.register_live_client(&google_id, credentials.clone());

        tracing::info!(google_id = %google_id, email = %email, "User authenticated");

        Ok(Session {
            google_id,
            email,
            credentials,
        })
    }

    /// If the live client registry holds non-expired credentials for this
    /// user, sync them into the session and proceed without a network call.
    fn adopt_live_client(
        &self,
        sessions: &SessionStore,
        session_id: &str,
        session: &Session,
    ) -> Option<AuthUser> {
        let live = self.clients.get(&session.google_id)?;
        live.last_used
            .store(self.clock.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
        if live.credentials.is_expired(Utc::now()) {
            return None;
        }
        let credentials = live.credentials.clone();
        drop(live);

        let updated = Session {
            google_id: session.google_id.clone(),
            email: session.email.clone(),
            credentials,
        };
        sessions.save(session_id, updated.clone());
        Some(auth_user(&updated))
    }

    /// Register (or rotate) a user's live credentials, evicting the least
    /// recently used entry past capacity. An evicted user's next request
    /// reloads credentials from the store.
    fn register_live_client(&self, google_id: &str, credentials: Credentials) {
        let stamp = self.clock.fetch_add(1, Ordering::Relaxed);
        self.clients.insert(
            google_id.to_string(),
            LiveCredentials {
                credentials,
                last_used: AtomicU64::new(stamp),
            },
        );
        self.evict_over_capacity();
    }

    fn evict_over_capacity(&self) {
        while self.clients.len() > self.max_live_clients {
            let oldest = self
                .clients
                .iter()
                .min_by_key(|entry| entry.last_used.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    tracing::debug!(user = %key, "Evicting idle live client");
                    self.clients.remove(&key);
                    self.refresh_locks.remove(&key);
                }
                None => break,
            }
        }
    }

    fn consent_required(&self, reason: ConsentReason) -> AuthDecision {
        tracing::info!(?reason, "Redirecting to consent screen");
        AuthDecision::ConsentRequired {
            url: self.client.consent_url(true),
            reason,
        }
    }
}

fn auth_user(session: &Session) -> AuthUser {
    AuthUser {
        google_id: session.google_id.clone(),
        email: session.email.clone(),
        access_token: session.credentials.access_token.clone(),
    }
}
