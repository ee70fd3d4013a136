//! The remote tier, backed by Redis.
//!
//! Available behind the `redis` cargo feature. Entries are stored under the
//! key's textual form as codec bytes, with the TTL mapped to `SET … EX`.
//! Payloads that no longer decode are reported as absent, so a corrupt or
//! stale-format value heals itself through re-execution and overwrite.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::context::Context;
use crate::entry::Entry;
use crate::key::Key;
use crate::store::Store;
use crate::store::StoreError;
use crate::store::Ttl;

/// A store bound to a remote Redis service.
///
/// ```ignore
/// let client = redis::Client::open("redis://127.0.0.1:6379")?;
/// let store = RedisStore::new(client.get_connection_manager().await?);
/// let drv = CachedDriver::builder(inner)
///     .layers(vec![
///         Arc::new(MemoryStore::new(256)) as Arc<dyn Store>,
///         Arc::new(store) as Arc<dyn Store>,
///     ])
///     .build();
/// ```
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    // An empty textual key is treated as absent: adds and deletes are
    // no-ops and lookups miss.
    fn text_key(key: &Key) -> Option<String> {
        let text = key.to_string();
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, ctx: &Context, key: &Key) -> Result<Arc<Entry>, StoreError> {
        let Some(text) = Self::text_key(key)
        else {
            return Err(StoreError::NotFound);
        };
        let mut conn = self.conn.clone();
        let buf: Option<Vec<u8>> = tokio::select! {
            () = ctx.cancelled() => return Err(StoreError::Cancelled),
            reply = conn.get(&text) => reply?,
        };
        match buf {
            None => Err(StoreError::NotFound),
            Some(buf) if buf.is_empty() => Err(StoreError::NotFound),
            Some(buf) => match Entry::from_bytes(&buf) {
                Ok(entry) => Ok(Arc::new(entry)),
                Err(err) => {
                    debug!(key = %text, error = %err, "discarding undecodable remote entry");
                    Err(StoreError::NotFound)
                }
            },
        }
    }

    async fn add(&self, ctx: &Context, key: &Key, entry: &Entry, ttl: Ttl) -> Result<(), StoreError> {
        let Some(text) = Self::text_key(key)
        else {
            return Ok(());
        };
        let buf = entry.to_bytes()?;
        let mut conn = self.conn.clone();
        match ttl {
            Ttl::Unbounded => {
                tokio::select! {
                    () = ctx.cancelled() => return Err(StoreError::Cancelled),
                    reply = conn.set::<_, _, ()>(&text, buf) => reply?,
                }
            }
            Ttl::After(d) => {
                let secs = d.as_secs().max(1);
                tokio::select! {
                    () = ctx.cancelled() => return Err(StoreError::Cancelled),
                    reply = conn.set_ex::<_, _, ()>(&text, buf, secs) => reply?,
                }
            }
            // Nothing would ever be served back.
            Ttl::Expired => {}
        }
        Ok(())
    }

    async fn del(&self, ctx: &Context, key: &Key) -> Result<(), StoreError> {
        let Some(text) = Self::text_key(key)
        else {
            return Ok(());
        };
        let mut conn = self.conn.clone();
        tokio::select! {
            () = ctx.cancelled() => return Err(StoreError::Cancelled),
            reply = conn.del::<_, ()>(&text) => reply?,
        }
        Ok(())
    }
}
