// SPDX-License-Identifier: MIT

//! Pluggable session blob store.
//!
//! Sessions are persisted as opaque blobs addressed by an opaque session
//! identifier. The store itself is an external collaborator: production
//! deployments put a networked key-value store behind this trait, while
//! tests and single-instance deployments use [`MemorySessionStore`].

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::AppError;

/// Key → blob persistence for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the blob stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError>;

    /// Store `value` under `key`, overwriting any prior value.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), AppError>;

    /// Delete the blob stored under `key`. Deleting a missing key is not
    /// an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// In-process session store backed by a concurrent map.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), AppError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.entries.remove(key);
        Ok(())
    }
}
