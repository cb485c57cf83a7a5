// SPDX-License-Identifier: MIT

//! Session record and cache manager.
//!
//! A session is the full cached state for one logged-in user: the Strava
//! credential triple, the linked Last.fm username, the app-level Spotify
//! token, and every dataset derived from provider calls. The record is a
//! write-through cache: handlers load the whole record, mutate it in
//! memory, and write the whole record back before the request completes.
//! There is no partial or merge write; the last writer wins.

use std::collections::HashMap;
use std::sync::Arc;

use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::store::SessionStore;

/// Strava credential triple. Mutated only by the credential refresher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp; the token is valid iff `now < expires_at`.
    pub expires_at: i64,
}

impl UserTokens {
    /// Whether the access token has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// App-level Spotify token from the client-credentials grant. Not tied to
/// any user; cached in the session alongside user state so it rides the
/// same write-back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppToken {
    pub token: String,
    /// Unix timestamp, set to half the provider-declared lifetime from
    /// grant time so renewal happens well before the token actually dies.
    pub expires_at: i64,
}

impl AppToken {
    /// Whether the token is still usable at `now`.
    pub fn is_valid(&self, now: i64) -> bool {
        now < self.expires_at
    }

    /// Internal expiry for a token granted at `now` with a declared
    /// lifetime of `expires_in` seconds.
    pub fn expiry_from_lifetime(now: i64, expires_in: i64) -> i64 {
        now + expires_in / 2
    }
}

/// Per-activity derived datasets, each an idempotent cache: once written
/// for an activity id, later requests are served from here until the
/// session is deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityCache {
    /// Raw activity detail as returned by Strava.
    pub detail: Option<Value>,
    /// Velocity/location time-series streams.
    pub streams: Option<Value>,
    /// Track plays during the activity window, enriched with duration.
    pub music: Option<Vec<Value>>,
    /// Per-track catalog cross-reference results.
    pub spotify: Option<Vec<Value>>,
}

/// The full session record persisted as one blob per session identifier.
///
/// A session exists iff `user_id` is present; an absent `user_id` means
/// unauthenticated, never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: Option<u64>,
    /// Athlete profile from the OAuth exchange; set once at login.
    pub athlete_info: Option<Value>,
    pub tokens: Option<UserTokens>,
    pub last_fm_username: Option<String>,
    /// Full-history run activities. Only cached when fetched with no date
    /// filter; date-filtered fetches bypass and never overwrite this.
    pub run_activities: Option<Vec<Value>>,
    /// Derived datasets keyed by activity id.
    #[serde(default)]
    pub activities: HashMap<String, ActivityCache>,
    pub spotify_token: Option<AppToken>,
}

impl SessionRecord {
    /// Whether this record belongs to a logged-in user.
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Mutable access to the per-activity cache, created on first touch.
    pub fn activity_mut(&mut self, activity_id: &str) -> &mut ActivityCache {
        self.activities.entry(activity_id.to_string()).or_default()
    }

    /// Read access to the per-activity cache.
    pub fn activity(&self, activity_id: &str) -> Option<&ActivityCache> {
        self.activities.get(activity_id)
    }
}

/// Session cache manager: serialization contract between the session
/// record and the blob store.
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn SessionStore>,
    rng: SystemRandom,
}

impl Sessions {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            rng: SystemRandom::new(),
        }
    }

    /// Generate a fresh session identifier: 128 bits of randomness,
    /// hex-encoded.
    pub fn new_session_id(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; 16];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("RNG failure")))?;
        Ok(hex::encode(bytes))
    }

    /// Load the record for `session_id`.
    ///
    /// Absent header, unknown identifier, or an undeserializable blob all
    /// yield an empty record; callers never fail just because there is no
    /// session.
    pub async fn load(&self, session_id: Option<&str>) -> SessionRecord {
        let Some(id) = session_id else {
            return SessionRecord::default();
        };

        match self.store.get(id).await {
            Ok(Some(blob)) => serde_json::from_slice(&blob).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discarding undeserializable session blob");
                SessionRecord::default()
            }),
            Ok(None) => SessionRecord::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Session store read failed, treating as no session");
                SessionRecord::default()
            }
        }
    }

    /// Serialize and store the full record, overwriting any prior value.
    pub async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), AppError> {
        let blob = serde_json::to_vec(record)
            .map_err(|e| AppError::Store(format!("Session serialization failed: {}", e)))?;
        self.store.set(session_id, blob).await
    }

    /// Delete the session blob. Used by logout.
    pub async fn delete(&self, session_id: &str) -> Result<(), AppError> {
        self.store.delete(session_id).await
    }
}
