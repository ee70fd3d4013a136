//! Cache tiers and the contract they share.
//!
//! A tier stores [`Entry`] values under a [`Key`] and reports misses with the
//! dedicated [`StoreError::NotFound`] sentinel. Tiers compose: an in-process
//! [`MemoryStore`] in front of a remote [`RedisStore`](redis::RedisStore)
//! behind a [`LayeredStore`], or a per-request store resolved from the call
//! context by [`ScopedStore`].

pub mod layered;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod scoped;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::Context;
use crate::entry::Entry;
use crate::key::Key;

pub use layered::LayeredStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
pub use scoped::ScopedStore;

/// Time-to-live of a cache entry.
///
/// The default is [`Ttl::Unbounded`]: entries never expire on their own.
/// [`Ttl::Expired`] stores an entry that is already past its expiry; a later
/// lookup never serves it. This is mostly useful for disabling a tier's hits
/// without removing the tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Ttl {
    #[default]
    Unbounded,
    After(Duration),
    Expired,
}

impl From<Duration> for Ttl {
    /// A zero duration maps to [`Ttl::Unbounded`].
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Self::Unbounded
        }
        else {
            Self::After(d)
        }
    }
}

/// Errors reported by cache tiers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The sentinel miss: the key holds no live entry. Never surfaced above
    /// the decorator.
    #[error("entry was not found")]
    NotFound,

    /// Entry encoding or decoding failed.
    #[error("entry codec: {0}")]
    Codec(#[from] postcard::Error),

    /// The remote service reported an error.
    #[cfg(feature = "redis")]
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),

    /// The call context was cancelled while the tier was waiting.
    #[error("store operation was cancelled")]
    Cancelled,

    /// A custom tier implementation failed.
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// The contract every cache tier implements.
///
/// `get` must return [`StoreError::NotFound`] on a miss; any other error is
/// treated as a tier failure and propagated. `add` receives the entry by
/// reference so multi-tier composition can hand the same entry to every tier;
/// implementations that retain it must take their own owned copy.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get(&self, ctx: &Context, key: &Key) -> Result<Arc<Entry>, StoreError>;

    async fn add(&self, ctx: &Context, key: &Key, entry: &Entry, ttl: Ttl) -> Result<(), StoreError>;

    async fn del(&self, ctx: &Context, key: &Key) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn get(&self, ctx: &Context, key: &Key) -> Result<Arc<Entry>, StoreError> {
        (**self).get(ctx, key).await
    }

    async fn add(&self, ctx: &Context, key: &Key, entry: &Entry, ttl: Ttl) -> Result<(), StoreError> {
        (**self).add(ctx, key, entry, ttl).await
    }

    async fn del(&self, ctx: &Context, key: &Key) -> Result<(), StoreError> {
        (**self).del(ctx, key).await
    }
}
