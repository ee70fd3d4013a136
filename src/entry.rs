//! The cached artifact of one query and its wire codec.

use serde::Deserialize;
use serde::Serialize;

use crate::value::Value;

/// The recorded result set of a single statement: the column names and the
/// full matrix of raw row values.
///
/// Entries are created when a caller fully iterates a fresh row stream, never
/// mutated afterwards, and destroyed by eviction, expiry, or an explicit
/// delete. The column list may be empty when the recording caller never asked
/// for column names; replay then lacks them as well.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub columns: Vec<String>,
    pub values:  Vec<Vec<Value>>,
}

impl Entry {
    pub fn new(columns: Vec<String>, values: Vec<Vec<Value>>) -> Self {
        Self { columns, values }
    }

    /// Number of recorded rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialises the entry into the wire format used by remote tiers.
    ///
    /// The encoding is structural and round-trips column order, row order,
    /// and every scalar's dynamic tag, timestamps included. Extending
    /// [`Value`](crate::value::Value) changes this format and is a breaking
    /// change for remote caches populated by older builds.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Decodes an entry from its wire format. Corrupt or truncated input is
    /// an error; stores treat it as an absent entry.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(buf)
    }
}
