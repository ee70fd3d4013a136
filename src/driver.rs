//! The driver contract and the caching decorator.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::context::Context;
use crate::error::Error;
use crate::key::DefaultHash;
use crate::key::Key;
use crate::key::QueryHasher;
use crate::rows::Recorder;
use crate::rows::Repeater;
use crate::rows::Rows;
use crate::rows::Sink;
use crate::store::LayeredStore;
use crate::store::MemoryStore;
use crate::store::ScopedStore;
use crate::store::Store;
use crate::store::StoreError;
use crate::store::Ttl;
use crate::value::Value;

/// The outcome of a statement that returns no rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub last_insert_id: Option<i64>,
    pub rows_affected:  u64,
}

/// The contract of a lower database driver.
///
/// `query` executes a statement and returns its row stream. `exec` is
/// provided for drivers that support it; the default implementation reports
/// [`Error::Unsupported`], which is what the decorator passes through for
/// wrapped drivers without an exec path.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn query(&self, ctx: &Context, stmt: &str, args: &[Value]) -> Result<Box<dyn Rows>, Error>;

    async fn exec(&self, _ctx: &Context, _stmt: &str, _args: &[Value]) -> Result<ExecResult, Error> {
        Err(Error::Unsupported("exec"))
    }
}

#[async_trait]
impl<D> Driver for Arc<D>
where
    D: Driver + ?Sized,
{
    async fn query(&self, ctx: &Context, stmt: &str, args: &[Value]) -> Result<Box<dyn Rows>, Error> {
        (**self).query(ctx, stmt, args).await
    }

    async fn exec(&self, ctx: &Context, stmt: &str, args: &[Value]) -> Result<ExecResult, Error> {
        (**self).exec(ctx, stmt, args).await
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) gets:   AtomicU64,
    pub(crate) hits:   AtomicU64,
    pub(crate) errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> Stats {
        Stats {
            gets:   self.gets.load(Ordering::Relaxed),
            hits:   self.hits.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A snapshot of the decorator's counters: lookups attempted, lookups served
/// from cache, and swallowed cache write failures. All three are
/// monotonically non-decreasing and `hits <= gets`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub gets:   u64,
    pub hits:   u64,
    pub errors: u64,
}

enum Resolution {
    Cache { key: Key, ttl: Ttl },
    Bypass,
}

/// A caching decorator around a [`Driver`].
///
/// Statements whose text starts with the read verb (`SELECT`/`select`) are
/// looked up in the configured store and, on a miss, recorded while they
/// stream back to the caller. Everything else is forwarded untouched, so
/// mutations that return rows (`INSERT … RETURNING`) are never cached.
///
/// Caching is advisory: a failing store never fails a query. Lookup errors
/// degrade to direct execution and write errors are logged and counted.
///
/// The decorator does not coalesce concurrent identical queries. When two
/// callers miss the same key at the same time, both execute against the
/// wrapped driver and the later store write wins.
///
/// ```ignore
/// let drv = CachedDriver::builder(pool)
///     .ttl(Duration::from_secs(30))
///     .layers(vec![
///         Arc::new(MemoryStore::new(256)) as Arc<dyn Store>,
///         Arc::new(RedisStore::new(conn)) as Arc<dyn Store>,
///     ])
///     .build();
/// ```
pub struct CachedDriver<D> {
    inner:    D,
    store:    Arc<dyn Store>,
    hasher:   Arc<dyn QueryHasher>,
    ttl:      Ttl,
    counters: Arc<Counters>,
}

impl<D> CachedDriver<D>
where
    D: Driver,
{
    /// Wraps `inner` with the default configuration: an unbounded
    /// [`MemoryStore`], the [`DefaultHash`] key derivation, and no expiry.
    pub fn new(inner: D) -> Self {
        Self::builder(inner).build()
    }

    pub fn builder(inner: D) -> CachedDriverBuilder<D> {
        CachedDriverBuilder::new(inner)
    }

    /// A snapshot of the cache statistics.
    pub fn stats(&self) -> Stats {
        self.counters.snapshot()
    }

    /// Forwards a query directly to the wrapped driver. The caching layer is
    /// not consulted and not populated, and the statistics do not change.
    pub async fn query_uncached(&self, ctx: &Context, stmt: &str, args: &[Value]) -> Result<Box<dyn Rows>, Error> {
        self.inner.query(ctx, stmt, args).await
    }

    /// Resolves the per-call options into a key and TTL, or into a bypass
    /// decision. Precedence: an attached key beats the hasher (a hasher
    /// failure bypasses); an attached TTL beats the decorator default; evict
    /// deletes the key and then bypasses; skip bypasses.
    async fn resolve(&self, ctx: &Context, stmt: &str, args: &[Value]) -> Resolution {
        let ambient = ctx.ambient();
        let key = match ambient.key {
            Some(key) => key,
            None => match self.hasher.hash(stmt, args) {
                Ok(key) => key,
                Err(err) => {
                    debug!(error = %err, "key derivation failed, bypassing cache");
                    return Resolution::Bypass;
                }
            },
        };
        let ttl = ambient.ttl.unwrap_or(self.ttl);
        if ambient.evict {
            if let Err(err) = self.store.del(ctx, &key).await {
                warn!(key = %key, error = %err, "failed evicting entry from cache");
            }
            return Resolution::Bypass;
        }
        if ambient.skip {
            return Resolution::Bypass;
        }
        Resolution::Cache { key, ttl }
    }
}

#[async_trait]
impl<D> Driver for CachedDriver<D>
where
    D: Driver,
{
    #[instrument(level = "trace", skip(self, ctx, args))]
    async fn query(&self, ctx: &Context, stmt: &str, args: &[Value]) -> Result<Box<dyn Rows>, Error> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        // Statements prefixed with comments or CTEs are forwarded as well;
        // only a plain leading read verb qualifies for caching.
        if !stmt.starts_with("SELECT") && !stmt.starts_with("select") {
            return self.inner.query(ctx, stmt, args).await;
        }
        let (key, ttl) = match self.resolve(ctx, stmt, args).await {
            Resolution::Cache { key, ttl } => (key, ttl),
            Resolution::Bypass => return self.inner.query(ctx, stmt, args).await,
        };
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        match self.store.get(ctx, &key).await {
            Ok(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Box::new(Repeater::new(entry)))
            }
            Err(StoreError::NotFound) => {
                let rows = self.inner.query(ctx, stmt, args).await?;
                let sink = Sink {
                    store:    self.store.clone(),
                    ctx:      ctx.clone(),
                    key,
                    ttl,
                    counters: self.counters.clone(),
                };
                Ok(Box::new(Recorder::new(rows, sink)))
            }
            Err(err) => {
                warn!(key = %key, error = %err, "cache lookup failed, bypassing cache");
                self.inner.query(ctx, stmt, args).await
            }
        }
    }

    async fn exec(&self, ctx: &Context, stmt: &str, args: &[Value]) -> Result<ExecResult, Error> {
        self.inner.exec(ctx, stmt, args).await
    }
}

/// Configures a [`CachedDriver`].
pub struct CachedDriverBuilder<D> {
    inner:  D,
    ttl:    Ttl,
    hasher: Arc<dyn QueryHasher>,
    store:  Option<Arc<dyn Store>>,
}

impl<D> CachedDriverBuilder<D>
where
    D: Driver,
{
    fn new(inner: D) -> Self {
        Self {
            inner,
            ttl: Ttl::Unbounded,
            hasher: Arc::new(DefaultHash),
            store: None,
        }
    }

    /// The default period of time an installed entry stays valid. Per-call
    /// overrides attached to the context take precedence.
    pub fn ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = ttl.into();
        self
    }

    /// Replaces the key derivation.
    pub fn hasher(mut self, hasher: impl QueryHasher) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }

    /// Uses a single store for the cache entries.
    pub fn store(mut self, store: impl Store) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Composes the given tiers, innermost first. For example an in-process
    /// [`MemoryStore`] in front of a remote tier.
    pub fn layers<I>(mut self, tiers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Store>>,
    {
        let mut tiers: Vec<Arc<dyn Store>> = tiers.into_iter().collect();
        self.store = Some(match tiers.len() {
            1 => tiers.pop().unwrap(),
            _ => Arc::new(LayeredStore::new(tiers)) as Arc<dyn Store>,
        });
        self
    }

    /// Caches into the store attached to each call's context instead of a
    /// shared one. See [`ScopedStore`].
    pub fn request_scoped(mut self) -> Self {
        self.store = Some(Arc::new(ScopedStore::new()));
        self
    }

    pub fn build(self) -> CachedDriver<D> {
        CachedDriver {
            inner:    self.inner,
            ttl:      self.ttl,
            hasher:   self.hasher,
            store:    self.store.unwrap_or_else(|| Arc::new(MemoryStore::unbounded())),
            counters: Arc::new(Counters::default()),
        }
    }
}
