//! # rowcache
//!
//! `rowcache` is a transparent read-cache decorator for SQL drivers. It sits
//! between an application and its database driver, and performs the
//! following tasks in addition to plain delegation:
//!
//! - Intercept row-returning `SELECT` statements and derive a
//!   content-addressable key from the statement text and its bound arguments
//! - Serve repeated statements from one or more cache tiers
//! - Record the raw column values of fresh responses, while they stream back
//!   to the caller, for later reuse
//!
//! The crate is based on the [`moka`](https://crates.io/crates/moka) cache
//! for its in-process tier and is designed for use in asynchronous contexts.
//!
//! ## Vocabulary
//!
//! - **Driver**: the lower-layer object that executes statements and returns
//!   row streams. Anything implementing [`Driver`](crate::driver::Driver).
//! - **Entry**: the cached artifact of one query, the column names plus the
//!   full matrix of raw row values.
//! - **Tier** (or store): one storage layer implementing add/get/del with a
//!   "not found" sentinel. Tiers compose in order, innermost first.
//! - **Ambient options**: per-call cache controls carried on the call
//!   context (skip, evict, key and TTL overrides).
//!
//! ## Basic Principles
//!
//! `rowcache` is read-only with respect to the database: it never rewrites
//! statements and never caches anything that is not shaped like a read.
//! Statements routed through the query entry point that mutate and return
//! rows (`INSERT … RETURNING`) are forwarded untouched.
//!
//! Caching is advisory. Correctness of results comes from the wrapped
//! driver, and the cache layer never degrades it: a failing tier downgrades
//! the call to direct execution, a failing entry installation is logged and
//! counted, and neither surfaces to the caller.
//!
//! The decorator does not synchronize identical queries executed
//! concurrently. If two callers miss the same key at the same time, both
//! execute against the wrapped driver and the last completed store write
//! wins.
//!
//! ## Architecture
//!
//! The central type is [`CachedDriver`](crate::driver::CachedDriver). It
//! owns a [`Store`](crate::store::Store), which is an unbounded in-process
//! [`MemoryStore`](crate::store::MemoryStore) by default and may be a
//! composition of tiers ending in a remote one, and a
//! [`QueryHasher`](crate::key::QueryHasher) for key derivation.
//!
//! On a miss the caller iterates a recorder that forwards the live driver
//! stream and captures raw rows on the side; the entry is installed only
//! after the stream was fully consumed without error. On a hit the caller
//! iterates a repeater that replays the cached matrix with identical scan
//! semantics. Column *type* metadata is deliberately not cached; callers
//! that need it must bypass.
//!
//! Per-call behavior is controlled through [`Context`](crate::context::Context):
//!
//! ```ignore
//! // Skip the cache for one call.
//! drv.query(&ctx.skip(), "SELECT id FROM users", &[]).await?;
//!
//! // Drop the entry and repopulate it on the next plain call.
//! drv.query(&ctx.evict(), "SELECT id FROM users", &[]).await?;
//!
//! // Cache into a store that lives exactly as long as this request.
//! let ctx = ctx.with_request_cache(Vec::new());
//! ```
//!
//! ## Caveats
//!
//! Entries are never invalidated by writes going through the same driver;
//! eviction is the caller's call, through TTLs or the `evict` helper. A
//! caller that never asks for column names records an entry without them,
//! and replay will lack them as well.

pub mod context;
pub mod driver;
pub mod entry;
pub mod error;
pub mod key;
pub mod rows;
pub mod store;
pub mod value;

pub use context::Context;
pub use driver::CachedDriver;
pub use driver::Driver;
pub use driver::Stats;
pub use entry::Entry;
pub use error::Error;
pub use key::Key;
pub use rows::Rows;
pub use store::Store;
pub use store::StoreError;
pub use store::Ttl;
pub use value::Value;

pub mod prelude {
    pub use crate::context::Context;
    pub use crate::driver::CachedDriver;
    pub use crate::driver::Driver;
    pub use crate::driver::ExecResult;
    pub use crate::driver::Stats;
    pub use crate::entry::Entry;
    pub use crate::error::Error;
    pub use crate::key::DefaultHash;
    pub use crate::key::Key;
    pub use crate::key::QueryHasher;
    pub use crate::rows::Rows;
    pub use crate::store::LayeredStore;
    pub use crate::store::MemoryStore;
    pub use crate::store::ScopedStore;
    pub use crate::store::Store;
    pub use crate::store::StoreError;
    pub use crate::store::Ttl;
    pub use crate::value::FromValue;
    pub use crate::value::ScanTarget;
    pub use crate::value::Value;
}
