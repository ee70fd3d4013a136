//! The in-process tier.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use moka::Expiry;

use crate::context::Context;
use crate::entry::Entry;
use crate::key::Key;
use crate::store::Store;
use crate::store::StoreError;
use crate::store::Ttl;

#[derive(Clone)]
struct Cached {
    entry: Arc<Entry>,
    ttl:   Ttl,
}

struct PerEntryExpiry;

impl Expiry<Key, Cached> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &Key, value: &Cached, _created_at: Instant) -> Option<Duration> {
        match value.ttl {
            Ttl::Unbounded => None,
            Ttl::After(d) => Some(d),
            Ttl::Expired => Some(Duration::ZERO),
        }
    }
}

/// A bounded in-process store with per-entry absolute expiry.
///
/// Backed by a moka cache pinned to the LRU eviction policy. Expired entries
/// are dropped when observed; a lookup never serves one.
pub struct MemoryStore {
    // `None` is the no-op variant: adds are discarded and every get misses.
    cache: Option<Cache<Key, Cached>>,
}

impl MemoryStore {
    /// Creates a store holding at most `capacity` entries. A capacity of
    /// zero means unbounded.
    pub fn new(capacity: u64) -> Self {
        let mut builder = Cache::builder()
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(PerEntryExpiry);
        if capacity > 0 {
            builder = builder.max_capacity(capacity);
        }
        Self {
            cache: Some(builder.build()),
        }
    }

    /// An unbounded store. This is the decorator's default.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// A no-op store: all adds are discarded and all gets miss. Useful for
    /// composing a remote-only [`LayeredStore`](crate::store::LayeredStore)
    /// without an in-process tier.
    pub fn disabled() -> Self {
        Self { cache: None }
    }

    /// Number of live entries, as far as the backing cache can tell.
    pub fn len(&self) -> u64 {
        self.cache.as_ref().map_or(0, Cache::entry_count)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, _ctx: &Context, key: &Key) -> Result<Arc<Entry>, StoreError> {
        let Some(cache) = &self.cache
        else {
            return Err(StoreError::NotFound);
        };
        cache
            .get(key)
            .await
            .map(|cached| cached.entry)
            .ok_or(StoreError::NotFound)
    }

    async fn add(&self, _ctx: &Context, key: &Key, entry: &Entry, ttl: Ttl) -> Result<(), StoreError> {
        let Some(cache) = &self.cache
        else {
            return Ok(());
        };
        let cached = Cached {
            entry: Arc::new(entry.clone()),
            ttl,
        };
        cache.insert(key.clone(), cached).await;
        Ok(())
    }

    async fn del(&self, _ctx: &Context, key: &Key) -> Result<(), StoreError> {
        if let Some(cache) = &self.cache {
            cache.invalidate(key).await;
        }
        Ok(())
    }
}
