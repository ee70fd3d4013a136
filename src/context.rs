//! The call context: ambient cache options, request-scoped stores, and
//! cancellation.
//!
//! A [`Context`] travels with every query. It is the only channel for
//! per-call cache configuration: the helpers below attach an options record
//! that the decorator consults when the call reaches it.
//!
//! The options record is a shared handle, not a value. Composing helpers
//! (`skip` after `with_key`) mutate the same record, and a context installed
//! at a parent scope observes options attached through any of its clones.
//! This is intentional: a request handler can mark a whole call tree
//! skip-cache without re-threading its context.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::key::Key;
use crate::store::LayeredStore;
use crate::store::MemoryStore;
use crate::store::Store;
use crate::store::Ttl;

/// Per-call cache controls. Resolved by the decorator; see
/// [`CachedDriver::query`](crate::driver::CachedDriver) for precedence.
#[derive(Clone, Debug, Default)]
pub(crate) struct AmbientOptions {
    pub(crate) skip:  bool,
    pub(crate) evict: bool,
    pub(crate) key:   Option<Key>,
    pub(crate) ttl:   Option<Ttl>,
}

/// The per-call context handed to [`Driver::query`](crate::driver::Driver).
///
/// Cloning is cheap; clones share the ambient options record, the request
/// cache, and the cancellation token.
#[derive(Clone, Default)]
pub struct Context {
    options:       Option<Arc<Mutex<AmbientOptions>>>,
    request_cache: Option<Arc<dyn Store>>,
    cancel:        CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tells the decorator to bypass the cache for queries made with this
    /// context: no lookup, no entry installed.
    pub fn skip(&self) -> Self {
        self.with_options(|opts| opts.skip = true)
    }

    /// Tells the decorator to delete the entry for the derived (or attached)
    /// key and then bypass the cache, so the next plain call repopulates it.
    pub fn evict(&self) -> Self {
        self.with_options(|opts| {
            opts.skip = true;
            opts.evict = true;
        })
    }

    /// Attaches an explicit cache key, overriding the hasher.
    ///
    /// Should not be used when one logical operation issues more than one
    /// statement (for example eager loading), as they would collide.
    pub fn with_key(&self, key: impl Into<Key>) -> Self {
        let key = key.into();
        self.with_options(|opts| opts.key = Some(key))
    }

    /// Attaches a TTL override for entries installed by this call.
    pub fn with_ttl(&self, ttl: impl Into<Ttl>) -> Self {
        let ttl = ttl.into();
        self.with_options(|opts| opts.ttl = Some(ttl))
    }

    /// Attaches a request-scoped cache, picked up by
    /// [`ScopedStore`](crate::store::ScopedStore) for the lifetime of this
    /// context.
    ///
    /// With no tiers a fresh unbounded [`MemoryStore`] is installed; a single
    /// tier is used as-is; several tiers compose into a [`LayeredStore`].
    pub fn with_request_cache<I>(&self, tiers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Store>>,
    {
        let mut tiers: Vec<Arc<dyn Store>> = tiers.into_iter().collect();
        let cache: Arc<dyn Store> = match tiers.len() {
            0 => Arc::new(MemoryStore::unbounded()),
            1 => tiers.pop().unwrap(),
            _ => Arc::new(LayeredStore::new(tiers)),
        };
        let mut ctx = self.clone();
        ctx.request_cache = Some(cache);
        ctx
    }

    /// The request-scoped cache attached to this context, if any.
    pub fn request_cache(&self) -> Option<Arc<dyn Store>> {
        self.request_cache.clone()
    }

    /// Binds the context to a cancellation token. Blocking cache and driver
    /// calls made with this context return early when the token fires.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        let mut ctx = self.clone();
        ctx.cancel = token;
        ctx
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Snapshot of the ambient options record.
    pub(crate) fn ambient(&self) -> AmbientOptions {
        self.options.as_ref().map_or_else(AmbientOptions::default, |record| record.lock().clone())
    }

    fn with_options(&self, f: impl FnOnce(&mut AmbientOptions)) -> Self {
        if let Some(record) = &self.options {
            f(&mut record.lock());
            self.clone()
        }
        else {
            let mut opts = AmbientOptions::default();
            f(&mut opts);
            let mut ctx = self.clone();
            ctx.options = Some(Arc::new(Mutex::new(opts)));
            ctx
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("options", &self.options.as_ref().map(|record| record.lock().clone()))
            .field("request_cache", &self.request_cache.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
