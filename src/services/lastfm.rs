// SPDX-License-Identifier: MIT

//! Last.fm API client (listening history).
//!
//! All methods hit the single audioscrobbler endpoint with a `method`
//! parameter. Responses are kept as raw JSON blobs; the correlation
//! pipeline picks out what it needs.

use serde_json::Value;

use crate::error::AppError;

/// Last.fm API client.
#[derive(Clone)]
pub struct LastFmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LastFmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "http://ws.audioscrobbler.com/2.0/".to_string(),
            api_key,
        }
    }

    /// Point the client at a different host. Used by tests.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = format!("{}/2.0/", base_url);
        self
    }

    /// Tracks scrobbled by `user` between the two Unix timestamps.
    ///
    /// Returns the normalized track list: Last.fm answers with a bare
    /// object instead of an array when exactly one track matched, and
    /// with nothing at all when none did.
    pub async fn recent_tracks(
        &self,
        user: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Value>, AppError> {
        let response = self
            .call(&[
                ("method", "user.getrecenttracks"),
                ("user", user),
                ("from", &from.to_string()),
                ("to", &to.to_string()),
            ])
            .await?;

        Ok(normalize_track_list(
            response.pointer("/recenttracks/track").unwrap_or(&Value::Null),
        ))
    }

    /// Track metadata by name and artist. Returns the inner `track`
    /// object, which carries `duration` in milliseconds (0 or absent for
    /// obscure tracks).
    pub async fn track_info(&self, track: &str, artist: &str) -> Result<Value, AppError> {
        let response = self
            .call(&[
                ("method", "track.getInfo"),
                ("track", track),
                ("artist", artist),
            ])
            .await?;

        Ok(response.get("track").cloned().unwrap_or(Value::Null))
    }

    /// Verify that a Last.fm account exists before linking it.
    pub async fn verify_user(&self, username: &str) -> Result<(), AppError> {
        let response = self
            .call(&[("method", "user.getinfo"), ("user", username)])
            .await?;

        // Last.fm reports unknown users inside a 200 body.
        if response.get("error").is_some_and(|e| !e.is_null()) {
            return Err(AppError::Upstream(format!(
                "Last.fm user {} not found",
                username
            )));
        }
        Ok(())
    }

    async fn call(&self, params: &[(&str, &str)]) -> Result<Value, AppError> {
        let response = self
            .http
            .post(&self.base_url)
            .query(params)
            .query(&[("api_key", self.api_key.as_str()), ("format", "json")])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Last.fm request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("JSON parse error: {}", e)))
    }
}

/// Normalize the single-result quirk: a bare track object becomes a
/// one-element list, an array passes through, anything else is empty.
pub fn normalize_track_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(tracks) => tracks.clone(),
        Value::Object(_) => vec![value.clone()],
        _ => Vec::new(),
    }
}
