// SPDX-License-Identifier: MIT

//! Credential lifecycle for the two provider grant flows.
//!
//! Both checks run before any authenticated provider call. A successful
//! renewal mutates the session record and persists it immediately; a
//! failed renewal propagates [`AppError::CredentialRefresh`] and leaves
//! the record untouched.

use chrono::Utc;

use crate::error::AppError;
use crate::session::{AppToken, SessionRecord, Sessions, UserTokens};
use crate::services::spotify::SpotifyClient;
use crate::services::strava::StravaClient;

/// Return a valid Strava access token for the session's user, refreshing
/// the credential triple via the refresh-token grant if it has expired.
pub async fn ensure_user_token(
    strava: &StravaClient,
    sessions: &Sessions,
    session_id: &str,
    record: &mut SessionRecord,
) -> Result<String, AppError> {
    let tokens = record.tokens.as_ref().ok_or(AppError::Unauthorized)?;

    let now = Utc::now().timestamp();
    if !tokens.is_expired(now) {
        return Ok(tokens.access_token.clone());
    }

    tracing::info!(user_id = ?record.user_id, "Access token expired, refreshing");
    let refreshed = strava.refresh_token(&tokens.refresh_token).await?;

    record.tokens = Some(UserTokens {
        access_token: refreshed.access_token.clone(),
        refresh_token: refreshed.refresh_token,
        expires_at: refreshed.expires_at,
    });
    sessions.save(session_id, record).await?;

    Ok(refreshed.access_token)
}

/// Return a valid app-level Spotify token, exchanging client credentials
/// for a new one if the cached token has passed half its declared
/// lifetime. Renewal is proactive, not reactive on first failure.
pub async fn ensure_app_token(
    spotify: &SpotifyClient,
    sessions: &Sessions,
    session_id: &str,
    record: &mut SessionRecord,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp();

    if let Some(token) = &record.spotify_token {
        if token.is_valid(now) {
            return Ok(token.token.clone());
        }
    }

    tracing::info!("Requesting new Spotify app token");
    let granted = spotify.request_app_token().await?;

    let token = AppToken {
        token: granted.access_token.clone(),
        expires_at: AppToken::expiry_from_lifetime(now, granted.expires_in),
    };
    record.spotify_token = Some(token);
    sessions.save(session_id, record).await?;

    Ok(granted.access_token)
}
