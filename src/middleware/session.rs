// SPDX-License-Identifier: MIT

//! Session identifier extraction.
//!
//! The frontend cannot use cookies cross-site, so the session identifier
//! travels in a `session-id` request header. A missing or unreadable
//! header is "no session", never a rejection; handlers decide whether an
//! empty session is acceptable.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Header carrying the session identifier.
pub const SESSION_ID_HEADER: &str = "session-id";

/// Opaque session identifier from the request, if one was supplied.
#[derive(Debug, Clone)]
pub struct SessionId(pub Option<String>);

impl SessionId {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(SESSION_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        Ok(SessionId(id))
    }
}
