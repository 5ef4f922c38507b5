// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Postgres-backed store with typed operations.
//!
//! Provides high-level operations for:
//! - Users (identity storage, email overwritten on re-auth)
//! - Credentials (upsert preserving the previous refresh token)
//! - File records (insert-or-ignore `(google_id, file_id)` pairs)
//!
//! Every operation acquires a pooled connection for its duration only, so
//! connections are returned on all exit paths.

use crate::error::AppError;
use crate::models::{Credentials, UserIdentity};
use dashmap::DashMap;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::sync::Arc;
use std::time::Duration;

/// Database handle shared across request handlers.
#[derive(Clone)]
pub struct Database {
    inner: DatabaseInner,
}

#[derive(Clone)]
enum DatabaseInner {
    Postgres(PgPool),
    /// In-memory store for tests; same contract as the Postgres variant.
    Memory(Arc<MemoryStore>),
}

#[derive(Default)]
struct MemoryStore {
    users: DashMap<String, UserIdentity>,
    credentials: DashMap<String, Credentials>,
    files: DashMap<String, Vec<String>>,
}

impl Database {
    /// Connect to Postgres and create the schema if it does not exist.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(2))
            .idle_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Postgres: {}", e)))?;

        Self::init_schema(&pool).await?;
        tracing::info!("Connected to Postgres");

        Ok(Self {
            inner: DatabaseInner::Postgres(pool),
        })
    }

    /// Create an in-memory store for testing (no database required).
    pub fn new_memory() -> Self {
        Self {
            inner: DatabaseInner::Memory(Arc::new(MemoryStore::default())),
        }
    }

    async fn init_schema(pool: &PgPool) -> Result<(), AppError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                google_id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE
            )",
        )
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Error initializing database: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tokens (
                google_id TEXT PRIMARY KEY REFERENCES users(google_id) ON DELETE CASCADE,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                expiry_date BIGINT NOT NULL,
                token_type TEXT,
                scope TEXT,
                id_token TEXT
            )",
        )
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Error initializing database: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS files (
                id SERIAL PRIMARY KEY,
                google_id TEXT REFERENCES users(google_id) ON DELETE CASCADE,
                file_id TEXT NOT NULL,
                UNIQUE(google_id, file_id)
            )",
        )
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Error initializing database: {}", e)))?;

        Ok(())
    }

    /// Close the connection pool. No-op for the in-memory variant.
    pub async fn close(&self) {
        if let DatabaseInner::Postgres(pool) = &self.inner {
            pool.close().await;
        }
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Create or update a user; the email is overwritten on re-auth.
    pub async fn upsert_user(&self, user: &UserIdentity) -> Result<(), AppError> {
        match &self.inner {
            DatabaseInner::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO users (google_id, email)
                     VALUES ($1, $2)
                     ON CONFLICT (google_id) DO UPDATE
                     SET email = EXCLUDED.email",
                )
                .bind(&user.google_id)
                .bind(&user.email)
                .execute(pool)
                .await
                .map_err(|e| {
                    AppError::Database(format!(
                        "Error saving user {}: {}",
                        user.google_id, e
                    ))
                })?;
            }
            DatabaseInner::Memory(store) => {
                store.users.insert(user.google_id.clone(), user.clone());
            }
        }
        Ok(())
    }

    /// Get a user by their Google ID.
    pub async fn get_user(&self, google_id: &str) -> Result<Option<UserIdentity>, AppError> {
        match &self.inner {
            DatabaseInner::Postgres(pool) => {
                let row = sqlx::query(
                    "SELECT google_id, email FROM users WHERE google_id = $1",
                )
                .bind(google_id)
                .fetch_optional(pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

                Ok(row.map(|r| UserIdentity {
                    google_id: r.get("google_id"),
                    email: r.get("email"),
                }))
            }
            DatabaseInner::Memory(store) => {
                Ok(store.users.get(google_id).map(|u| u.clone()))
            }
        }
    }

    // ─── Credential Operations ───────────────────────────────────

    /// Create or update credentials for a user.
    ///
    /// A refresh response may omit the refresh token; the previously stored
    /// one is preserved in that case.
    pub async fn upsert_credentials(
        &self,
        google_id: &str,
        credentials: &Credentials,
    ) -> Result<(), AppError> {
        match &self.inner {
            DatabaseInner::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO tokens (google_id, access_token, refresh_token, expiry_date, token_type, scope, id_token)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     ON CONFLICT (google_id) DO UPDATE
                     SET access_token = EXCLUDED.access_token,
                         refresh_token = CASE
                             WHEN EXCLUDED.refresh_token IS NOT NULL
                             THEN EXCLUDED.refresh_token
                             ELSE tokens.refresh_token
                         END,
                         expiry_date = EXCLUDED.expiry_date,
                         token_type = EXCLUDED.token_type,
                         scope = EXCLUDED.scope,
                         id_token = EXCLUDED.id_token",
                )
                .bind(google_id)
                .bind(&credentials.access_token)
                .bind(&credentials.refresh_token)
                .bind(credentials.expiry_date)
                .bind(&credentials.token_type)
                .bind(&credentials.scope)
                .bind(&credentials.id_token)
                .execute(pool)
                .await
                .map_err(|e| {
                    AppError::Database(format!(
                        "Error saving credentials for user {}: {}",
                        google_id, e
                    ))
                })?;
            }
            DatabaseInner::Memory(store) => {
                let merged = match store.credentials.get(google_id) {
                    Some(previous) => credentials.clone().merged_with_previous(&previous),
                    None => credentials.clone(),
                };
                store.credentials.insert(google_id.to_string(), merged);
            }
        }
        Ok(())
    }

    /// Get stored credentials for a user.
    pub async fn get_credentials(&self, google_id: &str) -> Result<Option<Credentials>, AppError> {
        match &self.inner {
            DatabaseInner::Postgres(pool) => {
                let row = sqlx::query(
                    "SELECT access_token, refresh_token, expiry_date, token_type, scope, id_token
                     FROM tokens WHERE google_id = $1",
                )
                .bind(google_id)
                .fetch_optional(pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

                Ok(row.map(|r| Credentials {
                    access_token: r.get("access_token"),
                    refresh_token: r.get("refresh_token"),
                    expiry_date: r.get("expiry_date"),
                    token_type: r.get("token_type"),
                    scope: r.get("scope"),
                    id_token: r.get("id_token"),
                }))
            }
            DatabaseInner::Memory(store) => {
                Ok(store.credentials.get(google_id).map(|c| c.clone()))
            }
        }
    }

    // ─── File Record Operations ──────────────────────────────────

    /// Record an uploaded file for a user. Duplicate pairs are ignored.
    pub async fn record_file(&self, google_id: &str, file_id: &str) -> Result<(), AppError> {
        match &self.inner {
            DatabaseInner::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO files (google_id, file_id)
                     VALUES ($1, $2)
                     ON CONFLICT (google_id, file_id) DO NOTHING",
                )
                .bind(google_id)
                .bind(file_id)
                .execute(pool)
                .await
                .map_err(|e| {
                    AppError::Database(format!(
                        "Error saving file for user {}: {}",
                        google_id, e
                    ))
                })?;
            }
            DatabaseInner::Memory(store) => {
                let mut ids = store.files.entry(google_id.to_string()).or_default();
                if !ids.iter().any(|id| id == file_id) {
                    ids.push(file_id.to_string());
                }
            }
        }
        Ok(())
    }

    /// List the recorded file IDs for a user.
    pub async fn file_ids(&self, google_id: &str) -> Result<Vec<String>, AppError> {
        match &self.inner {
            DatabaseInner::Postgres(pool) => {
                let rows = sqlx::query("SELECT file_id FROM files WHERE google_id = $1")
                    .bind(google_id)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok(rows.into_iter().map(|r| r.get("file_id")).collect())
            }
            DatabaseInner::Memory(store) => Ok(store
                .files
                .get(google_id)
                .map(|ids| ids.clone())
                .unwrap_or_default()),
        }
    }
}
