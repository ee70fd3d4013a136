//! Ordered multi-tier composition.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::entry::Entry;
use crate::key::Key;
use crate::store::Store;
use crate::store::StoreError;
use crate::store::Ttl;

/// An ordered list of tiers, innermost (fastest, cheapest to consult) first.
///
/// Lookups return the first tier's hit and do not back-fill inner tiers on
/// an outer hit. Writes and deletes visit every tier in order and stop at the
/// first failure, so a flaky outer tier can prevent population of the tiers
/// behind it; wrap a tier if its failures should be isolated.
pub struct LayeredStore {
    tiers: Vec<Arc<dyn Store>>,
}

impl LayeredStore {
    pub fn new(tiers: Vec<Arc<dyn Store>>) -> Self {
        Self { tiers }
    }
}

#[async_trait]
impl Store for LayeredStore {
    async fn get(&self, ctx: &Context, key: &Key) -> Result<Arc<Entry>, StoreError> {
        for tier in &self.tiers {
            match tier.get(ctx, key).await {
                Ok(entry) => return Ok(entry),
                Err(StoreError::NotFound) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::NotFound)
    }

    async fn add(&self, ctx: &Context, key: &Key, entry: &Entry, ttl: Ttl) -> Result<(), StoreError> {
        for tier in &self.tiers {
            tier.add(ctx, key, entry, ttl).await?;
        }
        Ok(())
    }

    async fn del(&self, ctx: &Context, key: &Key) -> Result<(), StoreError> {
        for tier in &self.tiers {
            tier.del(ctx, key).await?;
        }
        Ok(())
    }
}
