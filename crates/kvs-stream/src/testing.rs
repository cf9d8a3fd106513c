//! Instrumented store wrapper for session tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;

use kvs_store::{InMemoryKvStore, KvStore, StoreError, StoreResult};

/// A store call made by the writer, in the order it was issued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Set(String),
    Append(String, Vec<u8>),
    Rename(String, String),
}

#[derive(Default)]
struct InFlight {
    current: usize,
    peak: usize,
}

/// Wraps an [`InMemoryKvStore`], recording calls, tracking concurrent
/// appends per key, and optionally injecting latency and failures.
#[derive(Default)]
pub(crate) struct RecordingStore {
    pub inner: InMemoryKvStore,
    ops: Mutex<Vec<Op>>,
    appends: Mutex<HashMap<String, InFlight>>,
    append_calls: Mutex<usize>,
    jitter: Option<Duration>,
    append_delay: Option<Duration>,
    fail_truncate: bool,
    fail_append_at: Option<usize>,
    fail_rename: bool,
}

impl RecordingStore {
    pub fn new(inner: InMemoryKvStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Random delay in `[0, max]` before every call.
    pub fn with_jitter(mut self, max: Duration) -> Self {
        self.jitter = Some(max);
        self
    }

    /// Fixed delay before every append.
    pub fn with_append_delay(mut self, delay: Duration) -> Self {
        self.append_delay = Some(delay);
        self
    }

    pub fn failing_truncate(mut self) -> Self {
        self.fail_truncate = true;
        self
    }

    /// Fail the append call with this zero-based index.
    pub fn failing_append_at(mut self, index: usize) -> Self {
        self.fail_append_at = Some(index);
        self
    }

    pub fn failing_rename(mut self) -> Self {
        self.fail_rename = true;
        self
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn renames(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, Op::Rename(..)))
            .count()
    }

    /// Highest number of simultaneously outstanding appends seen on `key`.
    pub fn peak_appends(&self, key: &str) -> usize {
        self.appends
            .lock()
            .unwrap()
            .get(key)
            .map_or(0, |f| f.peak)
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }

    async fn pause(&self) {
        if let Some(max) = self.jitter {
            let micros = {
                let mut rng = rand::thread_rng();
                rng.gen_range(0..=max.as_micros() as u64)
            };
            tokio::time::sleep(Duration::from_micros(micros)).await;
        }
    }
}

#[async_trait]
impl KvStore for RecordingStore {
    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.record(Op::Set(key.to_string()));
        self.pause().await;
        if self.fail_truncate && value.is_empty() {
            return Err(StoreError::Connection("truncate refused".into()));
        }
        self.inner.set(key, value).await
    }

    async fn append(&self, key: &str, chunk: Bytes) -> StoreResult<u64> {
        self.record(Op::Append(key.to_string(), chunk.to_vec()));
        let index = {
            let mut calls = self.append_calls.lock().unwrap();
            *calls += 1;
            *calls - 1
        };
        {
            let mut appends = self.appends.lock().unwrap();
            let slot = appends.entry(key.to_string()).or_default();
            slot.current += 1;
            slot.peak = slot.peak.max(slot.current);
        }

        self.pause().await;
        if let Some(delay) = self.append_delay {
            tokio::time::sleep(delay).await;
        }
        let result = if self.fail_append_at == Some(index) {
            Err(StoreError::Backend("append refused".into()))
        } else {
            self.inner.append(key, chunk).await
        };

        if let Some(slot) = self.appends.lock().unwrap().get_mut(key) {
            slot.current -= 1;
        }
        result
    }

    async fn rename(&self, src: &str, dst: &str) -> StoreResult<()> {
        self.record(Op::Rename(src.to_string(), dst.to_string()));
        self.pause().await;
        if self.fail_rename {
            return Err(StoreError::Backend("rename refused".into()));
        }
        self.inner.rename(src, dst).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.inner.get(key).await
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        self.inner.del(key).await
    }
}
