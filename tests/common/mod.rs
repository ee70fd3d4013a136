//! Shared test doubles: a scripted driver, a recording store, and hashers
//! with observable behavior.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rowcache::key::KeyError;
use rowcache::prelude::*;

fn driver_error(msg: &str) -> Error {
    Error::driver(std::io::Error::new(std::io::ErrorKind::Other, msg.to_owned()))
}

/// A scripted row stream.
#[derive(Debug)]
pub struct FakeRows {
    columns:    Vec<String>,
    rows:       VecDeque<Vec<Value>>,
    current:    Option<Vec<Value>>,
    served:     usize,
    fail_after: Option<usize>,
    err:        Option<Error>,
}

#[async_trait]
impl Rows for FakeRows {
    async fn next(&mut self) -> bool {
        if Some(self.served) == self.fail_after {
            self.err = Some(driver_error("row iteration failed"));
            self.current = None;
            return false;
        }
        match self.rows.pop_front() {
            Some(row) => {
                self.current = Some(row);
                self.served += 1;
                true
            }
            None => {
                self.current = None;
                false
            }
        }
    }

    fn columns(&mut self) -> Result<Vec<String>, Error> {
        Ok(self.columns.clone())
    }

    fn scan(&mut self, dest: &mut [&mut dyn ScanTarget]) -> Result<(), Error> {
        let Some(row) = self.current.as_ref()
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
        Ok(())
    }

    fn err(&self) -> Option<Error> {
        self.err.clone()
    }

    async fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

struct Expectation {
    stmt:       String,
    columns:    Vec<String>,
    rows:       Vec<Vec<Value>>,
    fail_after: Option<usize>,
}

/// A driver that serves a queue of expected statements, in the manner of the
/// usual SQL mocking libraries: every query consumes the front expectation
/// and anything unexpected is an error.
#[derive(Default)]
pub struct FakeDriver {
    expectations: Mutex<VecDeque<Expectation>>,
    calls:        AtomicUsize,
}

impl FakeDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn expect(&self, stmt: &str, columns: &[&str], rows: Vec<Vec<Value>>) {
        self.expectations.lock().push_back(Expectation {
            stmt:       stmt.to_owned(),
            columns:    columns.iter().map(|&c| c.to_owned()).collect(),
            rows,
            fail_after: None,
        });
    }

    /// Like [`expect`](Self::expect), but iteration fails after `n` rows
    /// were served.
    pub fn expect_failing_rows(&self, stmt: &str, columns: &[&str], rows: Vec<Vec<Value>>, n: usize) {
        self.expectations.lock().push_back(Expectation {
            stmt:       stmt.to_owned(),
            columns:    columns.iter().map(|&c| c.to_owned()).collect(),
            rows,
            fail_after: Some(n),
        });
    }

    /// Number of queries that reached this driver.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn expectations_met(&self) -> bool {
        self.expectations.lock().is_empty()
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn query(&self, _ctx: &Context, stmt: &str, _args: &[Value]) -> Result<Box<dyn Rows>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(expectation) = self.expectations.lock().pop_front()
        else {
            return Err(driver_error(&format!("unexpected query: {stmt}")));
        };
        if expectation.stmt != stmt {
            return Err(driver_error(&format!(
                "expected query {:?}, got {stmt:?}",
                expectation.stmt
            )));
        }
        Ok(Box::new(FakeRows {
            columns:    expectation.columns,
            rows:       expectation.rows.into(),
            current:    None,
            served:     0,
            fail_after: expectation.fail_after,
            err:        None,
        }))
    }
}

/// The operations a [`RecordingStore`] observed, keys in textual form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Get { key: String, hit: bool },
    Add { key: String },
    Del { key: String },
}

/// Wraps a store and records every operation, in the manner of a remote
/// cache mock.
pub struct RecordingStore {
    inner: Arc<dyn Store>,
    ops:   Mutex<Vec<StoreOp>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Self::wrapping(Arc::new(MemoryStore::unbounded()))
    }

    pub fn wrapping(inner: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            ops: Mutex::new(Vec::new()),
        })
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().clone()
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn get(&self, ctx: &Context, key: &Key) -> Result<Arc<Entry>, StoreError> {
        let result = self.inner.get(ctx, key).await;
        self.ops.lock().push(StoreOp::Get {
            key: key.to_string(),
            hit: result.is_ok(),
        });
        result
    }

    async fn add(&self, ctx: &Context, key: &Key, entry: &Entry, ttl: Ttl) -> Result<(), StoreError> {
        self.ops.lock().push(StoreOp::Add { key: key.to_string() });
        self.inner.add(ctx, key, entry, ttl).await
    }

    async fn del(&self, ctx: &Context, key: &Key) -> Result<(), StoreError> {
        self.ops.lock().push(StoreOp::Del { key: key.to_string() });
        self.inner.del(ctx, key).await
    }
}

/// A store whose lookups miss and whose writes fail.
pub struct FailingAddStore;

#[async_trait]
impl Store for FailingAddStore {
    async fn get(&self, _ctx: &Context, _key: &Key) -> Result<Arc<Entry>, StoreError> {
        Err(StoreError::NotFound)
    }

    async fn add(&self, _ctx: &Context, _key: &Key, _entry: &Entry, _ttl: Ttl) -> Result<(), StoreError> {
        Err(StoreError::Backend("write refused".into()))
    }

    async fn del(&self, _ctx: &Context, _key: &Key) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A store whose lookups fail outright (not a miss).
pub struct FailingGetStore;

#[async_trait]
impl Store for FailingGetStore {
    async fn get(&self, _ctx: &Context, _key: &Key) -> Result<Arc<Entry>, StoreError> {
        Err(StoreError::Backend("lookup refused".into()))
    }

    async fn add(&self, _ctx: &Context, _key: &Key, _entry: &Entry, _ttl: Ttl) -> Result<(), StoreError> {
        Ok(())
    }

    async fn del(&self, _ctx: &Context, _key: &Key) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Counts how often the decorator asks for a key.
#[derive(Default)]
pub struct CountingHasher {
    count: AtomicUsize,
}

impl CountingHasher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl QueryHasher for CountingHasher {
    fn hash(&self, stmt: &str, args: &[Value]) -> Result<Key, KeyError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        DefaultHash.hash(stmt, args)
    }
}

/// Always fails key derivation, forcing the decorator to bypass.
pub struct FailingHasher;

impl QueryHasher for FailingHasher {
    fn hash(&self, _stmt: &str, _args: &[Value]) -> Result<Key, KeyError> {
        Err(KeyError::Custom("no key for you".into()))
    }
}

/// Maps every statement to the same key.
pub struct ConstHasher(pub u64);

impl QueryHasher for ConstHasher {
    fn hash(&self, _stmt: &str, _args: &[Value]) -> Result<Key, KeyError> {
        Ok(Key::Hash(self.0))
    }
}

/// Drains a row stream, scanning the single column of every row into `T`.
pub async fn collect<T>(mut rows: Box<dyn Rows>) -> Result<Vec<T>, Error>
where
    T: FromValue + Default,
{
    let mut out = Vec::new();
    while rows.next().await {
        let mut slot = T::default();
        rows.scan(&mut [&mut slot])?;
        out.push(slot);
    }
    if let Some(err) = rows.err() {
        return Err(err);
    }
    rows.close().await?;
    Ok(out)
}
