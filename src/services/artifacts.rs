//! Transient access locations for binary data
//!
//! The store hands out `blob:`-style locations for image bytes so frontends can
//! reference sources and results without copying them around. Each location is
//! owned by exactly one holder and must be revoked once; revoking is idempotent.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const LOCATION_PREFIX: &str = "blob:bgremove/";

/// A resolvable location for bytes held by an [`ArtifactStore`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactUrl(String);

impl ArtifactUrl {
    fn from_key(key: Uuid) -> Self {
        Self(format!("{}{}", LOCATION_PREFIX, key))
    }

    fn key(&self) -> Option<Uuid> {
        self.0
            .strip_prefix(LOCATION_PREFIX)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of live access locations
#[derive(Debug, Default)]
pub struct ArtifactStore {
    entries: Mutex<HashMap<Uuid, Bytes>>,
}

impl ArtifactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, Bytes>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a new location for `data`
    pub fn register(&self, data: Bytes) -> ArtifactUrl {
        let key = Uuid::new_v4();
        self.entries().insert(key, data);
        let url = ArtifactUrl::from_key(key);
        tracing::trace!(location = %url, "artifact registered");
        url
    }

    /// Resolve a live location to its bytes
    #[must_use]
    pub fn resolve(&self, url: &ArtifactUrl) -> Option<Bytes> {
        let key = url.key()?;
        self.entries().get(&key).cloned()
    }

    /// Release a location; returns `false` if it was already released or unknown
    pub fn revoke(&self, url: &ArtifactUrl) -> bool {
        let Some(key) = url.key() else {
            return false;
        };
        let released = self.entries().remove(&key).is_some();
        if released {
            tracing::trace!(location = %url, "artifact revoked");
        } else {
            tracing::debug!(location = %url, "artifact already revoked");
        }
        released
    }

    /// Number of live locations
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
