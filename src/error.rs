use std::sync::Arc;

use thiserror::Error;

/// The error type returned by [`Driver`](crate::driver::Driver)
/// implementations and row streams.
///
/// Errors produced by the wrapped driver are carried in [`Error::Driver`] and
/// surface to the caller verbatim. Caching failures never appear here: the
/// cache layer is advisory and falls back to direct execution instead.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// An error reported by the underlying database driver.
    #[error("driver: {0}")]
    Driver(Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// The requested operation is not implemented by the wrapped driver or
    /// by the active row stream.
    #[error("{0} is not supported")]
    Unsupported(&'static str),

    /// A raw column value could not be assigned to the scan destination.
    #[error("cannot assign a {from} value to a destination of type {to}")]
    Convert {
        from: &'static str,
        to:   &'static str,
    },

    /// The number of scan destinations does not match the row width.
    #[error("expected {expected} scan destinations, got {got}")]
    ColumnCount { expected: usize, got: usize },

    /// `scan` was called with no row positioned.
    #[error("no rows in result set")]
    NoRows,

    /// The call context was cancelled before the operation completed.
    #[error("operation was cancelled")]
    Cancelled,
}

impl Error {
    /// Wraps an arbitrary driver error.
    pub fn driver(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Driver(Arc::new(err))
    }
}
