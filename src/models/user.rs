//! User identity, OAuth credentials, and session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user as identified by Google.
///
/// `google_id` is immutable once created; `email` is overwritten on re-auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub google_id: String,
    pub email: String,
}

/// OAuth credentials issued by Google.
///
/// `expiry_date` is an absolute epoch-millisecond timestamp. The record is
/// usable for API calls only while `now <= expiry_date`; past that it must
/// be refreshed before use. A refresh response may omit `refresh_token`,
/// in which case the previously stored one must be preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry_date: i64,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
}

impl Credentials {
    /// Whether these credentials are past their expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() > self.expiry_date
    }

    /// Merge a refresh response with the previous credentials: new fields
    /// win, but a missing `refresh_token` falls back to the previous one.
    pub fn merged_with_previous(mut self, previous: &Credentials) -> Credentials {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.refresh_token.clone();
        }
        self
    }
}

/// Per-request auth state carried between requests via the session store.
#[derive(Debug, Clone)]
pub struct Session {
    pub google_id: String,
    pub email: String,
    pub credentials: Credentials,
}
