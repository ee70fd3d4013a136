//! Cache keys and statement hashing.

use std::fmt;

use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::value::Value;

/// A cache key.
///
/// The canonical hasher produces [`Key::Hash`] values; callers overriding the
/// key through the call context typically use [`Key::Text`]. The textual form
/// (`Display`) is what remote tiers store under; an empty textual form is
/// treated as an absent key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Fixed-width digest of a statement and its arguments.
    Hash(u64),
    /// A caller-chosen textual key.
    Text(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash(h) => write!(f, "{h}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for Key {
    fn from(h: u64) -> Self {
        Self::Hash(h)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Failure to derive a cache key.
///
/// The decorator reacts to any hasher error by bypassing the cache for that
/// call; it is never surfaced to the caller.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("encode key material: {0}")]
    Encode(#[from] postcard::Error),

    #[error("{0}")]
    Custom(String),
}

/// Derives a comparable key from a statement and its bound arguments.
///
/// Implementations must be pure: identical `(stmt, args)` pairs must produce
/// equal keys.
pub trait QueryHasher: Send + Sync + 'static {
    fn hash(&self, stmt: &str, args: &[Value]) -> Result<Key, KeyError>;
}

impl<H> QueryHasher for std::sync::Arc<H>
where
    H: QueryHasher + ?Sized,
{
    fn hash(&self, stmt: &str, args: &[Value]) -> Result<Key, KeyError> {
        (**self).hash(stmt, args)
    }
}

/// The default key derivation: a structural encoding of the statement text
/// and argument values digested with XXH3-64.
///
/// The digest is stable across processes, so default keys remain valid for a
/// remote tier after a restart. Argument order is significant.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHash;

impl QueryHasher for DefaultHash {
    fn hash(&self, stmt: &str, args: &[Value]) -> Result<Key, KeyError> {
        let material = postcard::to_allocvec(&(stmt, args))?;
        Ok(Key::Hash(xxh3_64(&material)))
    }
}
