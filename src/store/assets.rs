//! TTL cache for relayed sub-resources

use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

/// One cached asset
#[derive(Debug, Clone)]
pub struct CachedAsset {
    pub body: Bytes,
    pub content_type: String,
    stored_at: Instant,
}

/// Asset cache keyed by absolute URL
///
/// Expiry is lazy: a stale entry is dropped by the `get` that finds it.
#[derive(Debug)]
pub struct AssetCache {
    entries: DashMap<String, CachedAsset>,
    ttl: Duration,
}

impl AssetCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fresh entry for `url`, if any
    pub fn get(&self, url: &str) -> Option<CachedAsset> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(url) {
            if now.duration_since(entry.stored_at) < self.ttl {
                return Some(entry.value().clone());
            }
        }

        // Re-check under the write lock; a fresh put may have landed meanwhile.
        let ttl = self.ttl;
        if self
            .entries
            .remove_if(url, |_, entry| now.duration_since(entry.stored_at) >= ttl)
            .is_some()
        {
            debug!(url = url, "Evicted stale asset");
        }
        None
    }

    /// Store or replace the entry for `url`
    pub fn put(&self, url: &str, body: Bytes, content_type: &str) {
        self.entries.insert(
            url.to_string(),
            CachedAsset {
                body,
                content_type: content_type.to_string(),
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
