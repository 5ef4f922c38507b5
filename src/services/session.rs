// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process session store.
//!
//! Sessions are keyed by an opaque random ID carried in a cookie. Auth state
//! is read and written only through this store, so the token lifecycle
//! manager can be exercised in tests without a real web session.

use crate::models::Session;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// Length of the random session ID in bytes (before base64 encoding).
const SESSION_ID_BYTES: usize = 32;

/// Process-wide session store, constructed at startup and carried in
/// `AppState`.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    rng: SystemRandom,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            rng: SystemRandom::new(),
        }
    }

    /// Establish a new session and return its ID.
    pub fn insert(&self, session: Session) -> String {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        // SystemRandom::fill only fails when the OS RNG is unavailable.
        self.rng
            .fill(&mut bytes)
            .expect("system RNG unavailable");
        let id = URL_SAFE_NO_PAD.encode(bytes);
        self.sessions.insert(id.clone(), session);
        id
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    /// Persist updated auth state for an existing session ID.
    pub fn save(&self, session_id: &str, session: Session) {
        self.sessions.insert(session_id.to_string(), session);
    }

    pub fn remove(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }
}
