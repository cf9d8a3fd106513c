//! In-memory key-value store for tests and embedding.
//!
//! [`InMemoryKvStore`] keeps every value in a `HashMap` behind a `RwLock`.
//! Clones share the same key space, so a clone can be handed to a writer
//! while the test keeps another to inspect results. [`InMemoryBatch`] queues
//! commands and applies them under a single write lock, which makes the whole
//! batch atomic for concurrent readers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::command::{Command, Reply};
use crate::error::{StoreError, StoreResult};
use crate::traits::{CommandBatch, KvStore};

type KeySpace = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// In-memory, HashMap-based key-value store.
#[derive(Clone, Default)]
pub struct InMemoryKvStore {
    data: KeySpace,
}

impl InMemoryKvStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored values.
    pub fn total_bytes(&self) -> u64 {
        self.data
            .read()
            .expect("lock poisoned")
            .values()
            .map(|v| v.len() as u64)
            .sum()
    }

    /// Return a sorted list of all keys.
    pub fn keys(&self) -> Vec<String> {
        let map = self.data.read().expect("lock poisoned");
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove all keys.
    pub fn clear(&self) {
        self.data.write().expect("lock poisoned").clear();
    }

    /// Open a new command batch bound to this store's key space.
    pub fn batch(&self) -> InMemoryBatch {
        InMemoryBatch {
            data: Arc::clone(&self.data),
            queue: Mutex::new(Some(Vec::new())),
        }
    }

    fn apply(&self, command: Command) -> StoreResult<Reply> {
        let mut map = self.data.write().expect("lock poisoned");
        command.apply(&mut map)
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.apply(Command::Set {
            key: key.to_string(),
            value,
        })?;
        Ok(())
    }

    async fn append(&self, key: &str, chunk: Bytes) -> StoreResult<u64> {
        match self.apply(Command::Append {
            key: key.to_string(),
            value: chunk,
        })? {
            Reply::Length(len) => Ok(len),
            other => Err(StoreError::Backend(format!(
                "unexpected reply to APPEND: {other:?}"
            ))),
        }
    }

    async fn rename(&self, src: &str, dst: &str) -> StoreResult<()> {
        self.apply(Command::Rename {
            src: src.to_string(),
            dst: dst.to_string(),
        })?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let map = self.data.read().expect("lock poisoned");
        Ok(map.get(key).map(|v| Bytes::copy_from_slice(v)))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let map = self.data.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        match self.apply(Command::Del {
            key: key.to_string(),
        })? {
            Reply::Deleted(existed) => Ok(existed),
            other => Err(StoreError::Backend(format!(
                "unexpected reply to DEL: {other:?}"
            ))),
        }
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("key_count", &self.len())
            .finish()
    }
}

/// MULTI/EXEC style batch over an [`InMemoryKvStore`].
///
/// Commands are queued without touching the key space. [`exec`](Self::exec)
/// applies the whole queue under one write lock and closes the batch; a
/// failing command records its error reply and does not stop the rest.
pub struct InMemoryBatch {
    data: KeySpace,
    /// `None` once the batch has been executed or discarded.
    queue: Mutex<Option<Vec<Command>>>,
}

impl InMemoryBatch {
    /// Queue an arbitrary command.
    pub fn push(&self, command: Command) -> StoreResult<()> {
        let mut queue = self.queue.lock().expect("lock poisoned");
        match queue.as_mut() {
            Some(commands) => {
                commands.push(command);
                Ok(())
            }
            None => Err(StoreError::BatchClosed),
        }
    }

    /// Queue an unconditional overwrite.
    pub fn set(&self, key: &str, value: impl Into<Bytes>) -> StoreResult<()> {
        self.push(Command::Set {
            key: key.to_string(),
            value: value.into(),
        })
    }

    /// Queue an append.
    pub fn append(&self, key: &str, value: impl Into<Bytes>) -> StoreResult<()> {
        self.push(Command::Append {
            key: key.to_string(),
            value: value.into(),
        })
    }

    /// Queue a delete.
    pub fn del(&self, key: &str) -> StoreResult<()> {
        self.push(Command::Del {
            key: key.to_string(),
        })
    }

    /// Snapshot of the commands queued so far.
    pub fn commands(&self) -> Vec<Command> {
        self.queue
            .lock()
            .expect("lock poisoned")
            .clone()
            .unwrap_or_default()
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map_or(0, Vec::len)
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once the batch has been executed or discarded.
    pub fn is_closed(&self) -> bool {
        self.queue.lock().expect("lock poisoned").is_none()
    }

    /// Apply every queued command atomically and close the batch.
    ///
    /// Returns one reply per command, in queue order.
    pub fn exec(&self) -> StoreResult<Vec<StoreResult<Reply>>> {
        let commands = self
            .queue
            .lock()
            .expect("lock poisoned")
            .take()
            .ok_or(StoreError::BatchClosed)?;

        let mut map = self.data.write().expect("lock poisoned");
        let replies: Vec<StoreResult<Reply>> =
            commands.iter().map(|cmd| cmd.apply(&mut map)).collect();

        debug!(
            count = commands.len(),
            failed = replies.iter().filter(|r| r.is_err()).count(),
            "batch executed"
        );
        Ok(replies)
    }

    /// Drop every queued command and close the batch.
    pub fn discard(&self) -> StoreResult<()> {
        self.queue
            .lock()
            .expect("lock poisoned")
            .take()
            .map(|_| ())
            .ok_or(StoreError::BatchClosed)
    }
}

impl CommandBatch for InMemoryBatch {
    fn rename(&self, src: &str, dst: &str) -> StoreResult<()> {
        self.push(Command::Rename {
            src: src.to_string(),
            dst: dst.to_string(),
        })
    }
}

impl std::fmt::Debug for InMemoryBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBatch")
            .field("queued", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
