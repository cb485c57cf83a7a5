// SPDX-License-Identifier: MIT

//! Spotify Web API client (music catalog).
//!
//! Authenticates with the client-credentials grant: the app-level token
//! is requested with a Basic `id:secret` header and carries no user
//! context. Token lifecycle lives in [`crate::services::credentials`];
//! this client only knows how to ask for a token and make catalog calls.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;

/// Spotify Web API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            client_id,
            client_secret,
        }
    }

    /// Point the client at a different host. Used by tests.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = format!("{}/v1", base_url);
        self.token_url = format!("{}/api/token", base_url);
        self
    }

    /// Request a fresh app-level token via the client-credentials grant.
    pub async fn request_app_token(&self) -> Result<AppTokenResponse, AppError> {
        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http
            .post(&self.token_url)
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                AppError::CredentialRefresh(format!("Spotify token request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::CredentialRefresh(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::CredentialRefresh(format!("JSON parse error: {}", e)))
    }

    /// Best-matching track for a free-text query, if any.
    pub async fn search_track(&self, token: &str, query: &str) -> Result<Option<Value>, AppError> {
        let result = self
            .get(
                token,
                "search",
                &[("q", query), ("type", "track"), ("limit", "1")],
            )
            .await?;
        Ok(first_item(&result, "/tracks/items"))
    }

    /// Best-matching artist for a free-text query, if any.
    pub async fn search_artist(&self, token: &str, query: &str) -> Result<Option<Value>, AppError> {
        let result = self
            .get(
                token,
                "search",
                &[("q", query), ("type", "artist"), ("limit", "1")],
            )
            .await?;
        Ok(first_item(&result, "/artists/items"))
    }

    /// Full track detail by catalog id.
    pub async fn get_track(&self, token: &str, track_id: &str) -> Result<Value, AppError> {
        self.get(token, &format!("tracks/{}", track_id), &[]).await
    }

    /// An artist's top tracks, restricted to one market.
    pub async fn artist_top_tracks(
        &self,
        token: &str,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Value>, AppError> {
        let result = self
            .get(
                token,
                &format!("artists/{}/top-tracks", artist_id),
                &[("market", market)],
            )
            .await?;
        Ok(item_list(&result, "tracks"))
    }

    /// Recommendations seeded by one artist and one track.
    pub async fn recommendations(
        &self,
        token: &str,
        artist_id: &str,
        track_id: &str,
        limit: u32,
    ) -> Result<Vec<Value>, AppError> {
        let result = self
            .get(
                token,
                "recommendations",
                &[
                    ("seed_artist", artist_id),
                    ("seed_tracks", track_id),
                    ("limit", &limit.to_string()),
                ],
            )
            .await?;
        Ok(item_list(&result, "tracks"))
    }

    async fn get(
        &self,
        token: &str,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, AppError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Spotify request failed: {}", e)))?;

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

/// Client-credentials grant response.
#[derive(Debug, Clone, Deserialize)]
pub struct AppTokenResponse {
    pub access_token: String,
    /// Provider-declared lifetime in seconds.
    pub expires_in: i64,
}

fn first_item(value: &Value, pointer: &str) -> Option<Value> {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .cloned()
}

fn item_list(value: &Value, key: &str) -> Vec<Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// First image URL on a track's album or an artist object. Missing
/// artwork degrades to `None` rather than failing the record.
pub fn first_image_url(entity: &Value) -> Option<String> {
    let images = entity
        .pointer("/album/images")
        .or_else(|| entity.get("images"))?;
    images
        .as_array()?
        .first()?
        .get("url")?
        .as_str()
        .map(str::to_string)
}
