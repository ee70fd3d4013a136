//! Row streams: the contract the decorator preserves, the recorder that
//! captures fresh rows, and the repeater that replays cached ones.
//!
//! The caller must see the same iteration semantics on both the hit and the
//! miss path. The recorder and the repeater therefore implement the same
//! [`Rows`] contract, but deliberately share no code: the recorder's life is
//! tied to a live driver stream, the repeater's to an immutable entry.

use std::mem;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::context::Context;
use crate::driver::Counters;
use crate::entry::Entry;
use crate::error::Error;
use crate::key::Key;
use crate::store::Store;
use crate::store::Ttl;
use crate::value::ScanTarget;
use crate::value::Value;

/// Column metadata as reported by a live driver stream.
///
/// Replayed streams cannot provide it; the decorator does not cache type
/// metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnType {
    pub name:          String,
    pub database_type: String,
    pub nullable:      Option<bool>,
}

/// A forward-only stream of rows with column metadata, scan-into-destination
/// semantics, and end/error signalling.
///
/// The protocol is the usual one: `next` positions the stream on the
/// following row and reports whether one exists, `scan` assigns the current
/// row's raw values into the given destinations, `err` reports an error that
/// terminated iteration early, and `close` releases the stream.
#[async_trait]
pub trait Rows: Send + std::fmt::Debug {
    /// Advances to the next row. Returns `false` at end-of-stream or when
    /// iteration failed; `err` distinguishes the two.
    async fn next(&mut self) -> bool;

    /// The column names of the result set.
    fn columns(&mut self) -> Result<Vec<String>, Error>;

    /// Assigns the current row into `dest`, one destination per column.
    fn scan(&mut self, dest: &mut [&mut dyn ScanTarget]) -> Result<(), Error>;

    /// The error that stopped iteration, if any.
    fn err(&self) -> Option<Error>;

    /// Releases the stream.
    async fn close(&mut self) -> Result<(), Error>;

    /// Column type metadata, where the stream can provide it.
    fn column_types(&mut self) -> Result<Vec<ColumnType>, Error> {
        Err(Error::Unsupported("column_types"))
    }
}

/// Where a recorder delivers its captured entry on a clean close.
pub(crate) struct Sink {
    pub(crate) store:    Arc<dyn Store>,
    pub(crate) ctx:      Context,
    pub(crate) key:      Key,
    pub(crate) ttl:      Ttl,
    pub(crate) counters: Arc<Counters>,
}

impl Sink {
    async fn install(self, entry: &Entry) {
        if let Err(err) = self.store.add(&self.ctx, &self.key, entry, self.ttl).await {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            warn!(key = %self.key, error = %err, "failed storing entry in cache");
        }
    }
}

/// The miss path: wraps the live driver stream, forwards every operation,
/// and captures the raw rows on the side.
pub(crate) struct Recorder {
    inner:   Box<dyn Rows>,
    columns: Vec<String>,
    values:  Vec<Vec<Value>>,
    done:    bool,
    sink:    Option<Sink>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder").finish_non_exhaustive()
    }
}

impl Recorder {
    pub(crate) fn new(inner: Box<dyn Rows>, sink: Sink) -> Self {
        Self {
            inner,
            columns: Vec::new(),
            values: Vec::new(),
            done: false,
            sink: Some(sink),
        }
    }
}

#[async_trait]
impl Rows for Recorder {
    async fn next(&mut self) -> bool {
        let has_next = self.inner.next().await;
        self.done = !has_next;
        has_next
    }

    /// Forwards and memoises the column names. If the caller never asks for
    /// columns, the recorded entry carries none.
    fn columns(&mut self) -> Result<Vec<String>, Error> {
        let columns = self.inner.columns()?;
        self.columns = columns.clone();
        Ok(columns)
    }

    /// Scans the raw row into an owned buffer first, then converts into the
    /// caller's destinations. Byte sequences are deep-copied here: the
    /// driver may reuse its buffers between rows.
    fn scan(&mut self, dest: &mut [&mut dyn ScanTarget]) -> Result<(), Error> {
        let mut raw = vec![Value::Null; dest.len()];
        {
            let mut slots: Vec<&mut dyn ScanTarget> =
                raw.iter_mut().map(|slot| slot as &mut dyn ScanTarget).collect();
            self.inner.scan(&mut slots)?;
        }
        for (dst, value) in dest.iter_mut().zip(raw.iter()) {
            dst.assign(value)?;
        }
        self.values.push(raw);
        Ok(())
    }

    fn err(&self) -> Option<Error> {
        self.inner.err()
    }

    /// Closes the underlying stream. The captured entry is installed in the
    /// store only when end-of-stream was observed and no iteration error is
    /// pending; a partially consumed or failed stream leaves the cache
    /// untouched.
    async fn close(&mut self) -> Result<(), Error> {
        self.inner.close().await?;
        if self.done && self.inner.err().is_none() {
            if let Some(sink) = self.sink.take() {
                let entry = Entry::new(mem::take(&mut self.columns), mem::take(&mut self.values));
                sink.install(&entry).await;
            }
        }
        Ok(())
    }

    fn column_types(&mut self) -> Result<Vec<ColumnType>, Error> {
        self.inner.column_types()
    }
}

/// The hit path: replays a cached entry. Wraps nothing.
pub(crate) struct Repeater {
    entry: Arc<Entry>,
    pos:   usize,
}

impl std::fmt::Debug for Repeater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repeater").finish_non_exhaustive()
    }
}

impl Repeater {
    pub(crate) fn new(entry: Arc<Entry>) -> Self {
        Self { entry, pos: 0 }
    }
}

#[async_trait]
impl Rows for Repeater {
    async fn next(&mut self) -> bool {
        self.pos < self.entry.values.len()
    }

    fn columns(&mut self) -> Result<Vec<String>, Error> {
        Ok(self.entry.columns.clone())
    }

    fn scan(&mut self, dest: &mut [&mut dyn ScanTarget]) -> Result<(), Error> {
        let Some(row) = self.entry.values.get(self.pos)
        else {
            return Err(Error::NoRows);
        };
        if dest.len() != row.len() {
            return Err(Error::ColumnCount {
                expected: row.len(),
                got:      dest.len(),
            });
        }
        for (dst, value) in dest.iter_mut().zip(row.iter()) {
            dst.assign(value)?;
        }
        self.pos += 1;
        Ok(())
    }

    fn err(&self) -> Option<Error> {
        None
    }

    async fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[derive(Debug)]
    struct StaticRows {
        columns: Vec<String>,
        rows:    Vec<Vec<Value>>,
        pos:     usize,
    }

    #[async_trait]
    impl Rows for StaticRows {
        async fn next(&mut self) -> bool {
            if self.pos < self.rows.len() {
                self.pos += 1;
                true
            }
            else {
                false
            }
        }

        fn columns(&mut self) -> Result<Vec<String>, Error> {
            Ok(self.columns.clone())
        }

        fn scan(&mut self, dest: &mut [&mut dyn ScanTarget]) -> Result<(), Error> {
            let row = &self.rows[self.pos - 1];
            for (dst, value) in dest.iter_mut().zip(row.iter()) {
                dst.assign(value)?;
            }
            Ok(())
        }

        fn err(&self) -> Option<Error> {
            None
        }

        async fn close(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }

    fn sink(store: &Arc<MemoryStore>) -> (Sink, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let sink = Sink {
            store:    store.clone() as Arc<dyn Store>,
            ctx:      Context::new(),
            key:      Key::from("q"),
            ttl:      Ttl::Unbounded,
            counters: counters.clone(),
        };
        (sink, counters)
    }

    #[tokio::test]
    async fn recorder_installs_after_full_iteration() {
        let store = Arc::new(MemoryStore::unbounded());
        let (sink, _) = sink(&store);
        let inner = StaticRows {
            columns: vec!["id".into()],
            rows:    vec![vec![Value::Int(1)], vec![Value::Int(2)]],
            pos:     0,
        };
        let mut recorder = Recorder::new(Box::new(inner), sink);

        let mut got = Vec::new();
        assert_eq!(recorder.columns().unwrap(), vec!["id".to_string()]);
        while recorder.next().await {
            let mut id = 0i64;
            recorder.scan(&mut [&mut id]).unwrap();
            got.push(id);
        }
        recorder.close().await.unwrap();

        assert_eq!(got, vec![1, 2]);
        let entry = store.get(&Context::new(), &Key::from("q")).await.unwrap();
        assert_eq!(entry.columns, vec!["id".to_string()]);
        assert_eq!(entry.values, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    }

    #[tokio::test]
    async fn recorder_skips_partially_consumed_streams() {
        let store = Arc::new(MemoryStore::unbounded());
        let (sink, _) = sink(&store);
        let inner = StaticRows {
            columns: vec!["id".into()],
            rows:    vec![vec![Value::Int(1)], vec![Value::Int(2)]],
            pos:     0,
        };
        let mut recorder = Recorder::new(Box::new(inner), sink);

        assert!(recorder.next().await);
        let mut id = 0i64;
        recorder.scan(&mut [&mut id]).unwrap();
        recorder.close().await.unwrap();

        assert!(store.get(&Context::new(), &Key::from("q")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn repeater_replays_with_scan_semantics() {
        let entry = Arc::new(Entry::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Int(1), Value::from("a8m")],
                vec![Value::Int(2), Value::Null],
            ],
        ));
        let mut repeater = Repeater::new(entry);

        assert_eq!(repeater.columns().unwrap(), vec!["id".to_string(), "name".to_string()]);
        assert!(repeater.err().is_none());

        let mut got = Vec::new();
        while repeater.next().await {
            let mut id = 0i64;
            let mut name: Option<String> = None;
            repeater.scan(&mut [&mut id, &mut name]).unwrap();
            got.push((id, name));
        }
        repeater.close().await.unwrap();

        assert_eq!(got, vec![(1, Some("a8m".into())), (2, None)]);
    }

    #[tokio::test]
    async fn repeater_rejects_overruns_and_width_mismatch() {
        let entry = Arc::new(Entry::new(vec!["id".into()], vec![vec![Value::Int(1)]]));
        let mut repeater = Repeater::new(entry);

        let mut id = 0i64;
        let mut extra = 0i64;
        assert!(matches!(
            repeater.scan(&mut [&mut id, &mut extra]),
            Err(Error::ColumnCount { expected: 1, got: 2 })
        ));

        repeater.scan(&mut [&mut id]).unwrap();
        assert!(!repeater.next().await);
        assert!(matches!(repeater.scan(&mut [&mut id]), Err(Error::NoRows)));
    }

    #[tokio::test]
    async fn repeater_has_no_type_metadata() {
        let mut repeater = Repeater::new(Arc::new(Entry::default()));
        assert!(matches!(repeater.column_types(), Err(Error::Unsupported(_))));
    }
}
