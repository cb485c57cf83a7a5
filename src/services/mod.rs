// SPDX-License-Identifier: MIT

//! Services module - provider clients and business logic.

pub mod correlate;
pub mod credentials;
pub mod lastfm;
pub mod spotify;
pub mod strava;

pub use lastfm::LastFmClient;
pub use spotify::SpotifyClient;
pub use strava::StravaClient;
