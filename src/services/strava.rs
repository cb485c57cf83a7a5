// SPDX-License-Identifier: MIT

//! Strava API client.
//!
//! Handles:
//! - OAuth code exchange and refresh-token grants
//! - Paginated full-history activity fetching
//! - Per-activity detail and stream fetching

use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;

/// Fixed page size for activity listing. A response page with fewer items
/// than this signals the end of history.
const ACTIVITY_PAGE_SIZE: usize = 200;

/// Activity type tag we keep when filtering.
const RUN_ACTIVITY_TYPE: &str = "Run";

/// Optional date window for activity listing. An empty filter means
/// "full history", which is the only shape that gets cached.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Unix timestamp lower bound (`after` on the wire).
    pub start_date: Option<String>,
    /// Unix timestamp upper bound (`before` on the wire).
    pub end_date: Option<String>,
}

impl ActivityFilter {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none()
    }
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://www.strava.com/api/v3".to_string(),
            token_url: "https://www.strava.com/oauth/token".to_string(),
            client_id,
            client_secret,
        }
    }

    /// Point the client at a different API host. Used by tests to target a
    /// local mock provider.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = format!("{}/api/v3", base_url);
        self.token_url = format!("{}/oauth/token", base_url);
        self
    }

    /// Exchange an authorization code for the credential triple plus the
    /// athlete profile.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Token exchange failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::CredentialRefresh(format!("Token refresh request failed: {}", e))
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

    /// Fetch the athlete's complete activity history, optionally bounded
    /// by a date window.
    ///
    /// Pages of 200 are requested until a page comes back short: fewer
    /// than 200 items means there is nothing after it. A history whose
    /// final page holds exactly 200 items therefore costs one extra
    /// (empty) round trip; that is the terminal condition, there is no
    /// total-count check.
    pub async fn fetch_all_activities(
        &self,
        access_token: &str,
        filter: &ActivityFilter,
    ) -> Result<Vec<Value>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);
        let mut all_activities = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut query = vec![
                ("per_page", ACTIVITY_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(after) = &filter.start_date {
                query.push(("after", after.clone()));
            }
            if let Some(before) = &filter.end_date {
                query.push(("before", before.clone()));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| AppError::Upstream(format!("Activity list failed: {}", e)))?;

            let page_items: Vec<Value> = self.check_response_json(response).await?;
            let page_len = page_items.len();
            all_activities.extend(page_items);
            page += 1;

            if page_len != ACTIVITY_PAGE_SIZE {
                break;
            }
        }

        Ok(all_activities)
    }

    /// Get a detailed activity by ID. Returned as the raw provider blob;
    /// callers pick out the fields they need.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: &str,
    ) -> Result<Value, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Activity fetch failed: {}", e)))?;

        let detail: Value = self.check_response_json(response).await?;

        // Strava reports per-field errors inside a 200 body.
        if detail.get("errors").is_some_and(|e| !e.is_null()) {
            return Err(AppError::Upstream(format!(
                "Activity {} fetch returned errors",
                activity_id
            )));
        }

        Ok(detail)
    }

    /// Get an activity's velocity and location streams.
    pub async fn get_activity_streams(
        &self,
        access_token: &str,
        activity_id: &str,
    ) -> Result<Value, AppError> {
        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("series_type", "time"),
                ("keys", "latlng,velocity_smooth"),
                ("key_by_type", "true"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stream fetch failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Get the authenticated athlete's profile.
    pub async fn get_athlete(&self, access_token: &str) -> Result<Value, AppError> {
        let url = format!("{}/athlete", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Athlete fetch failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
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

/// Keep only running activities.
pub fn filter_runs(activities: Vec<Value>) -> Vec<Value> {
    activities
        .into_iter()
        .filter(|a| {
            a.get("type")
                .and_then(Value::as_str)
                .is_some_and(|t| t == RUN_ACTIVITY_TYPE)
        })
        .collect()
}

/// Token exchange response from Strava OAuth (includes athlete profile).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: Value,
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}
