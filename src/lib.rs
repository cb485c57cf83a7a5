// SPDX-License-Identifier: MIT

//! Runbeats: correlate runs with the music played during them.
//!
//! This crate provides the backend API that joins a user's Strava
//! activity history with their Last.fm listening history and enriches
//! the result from the Spotify catalog. The core is a session-scoped
//! cache-and-refresh layer: every derived dataset is computed at most
//! once per session and written back through the session manager.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod session;
pub mod store;

use config::Config;
use services::{LastFmClient, SpotifyClient, StravaClient};
use session::Sessions;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sessions: Sessions,
    pub strava: StravaClient,
    pub lastfm: LastFmClient,
    pub spotify: SpotifyClient,
}
