//! The request-scope tier.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::entry::Entry;
use crate::key::Key;
use crate::store::Store;
use crate::store::StoreError;
use crate::store::Ttl;

/// A tier whose backing store is resolved from the call context.
///
/// Callers opt into request-level caching by attaching a store with
/// [`Context::with_request_cache`]; the decorator then reads and writes that
/// store only, for exactly the lifetime of the context. Without an attached
/// store every lookup misses and writes are silently dropped, so a decorator
/// configured for request scope stays correct for callers that never opt in.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScopedStore;

impl ScopedStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Store for ScopedStore {
    async fn get(&self, ctx: &Context, key: &Key) -> Result<Arc<Entry>, StoreError> {
        match ctx.request_cache() {
            Some(store) => store.get(ctx, key).await,
            None => Err(StoreError::NotFound),
        }
    }

    async fn add(&self, ctx: &Context, key: &Key, entry: &Entry, ttl: Ttl) -> Result<(), StoreError> {
        match ctx.request_cache() {
            Some(store) => store.add(ctx, key, entry, ttl).await,
            None => Ok(()),
        }
    }

    async fn del(&self, ctx: &Context, key: &Key) -> Result<(), StoreError> {
        match ctx.request_cache() {
            Some(store) => store.del(ctx, key).await,
            None => Ok(()),
        }
    }
}
