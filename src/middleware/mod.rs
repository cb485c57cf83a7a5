// SPDX-License-Identifier: MIT

//! Request middleware and extractors.

pub mod security;
pub mod session;

pub use session::SessionId;
