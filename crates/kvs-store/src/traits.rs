use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;

/// Asynchronous key-value store client.
///
/// All implementations must satisfy these invariants:
/// - Each call resolves or fails independently; callers see exactly one
///   outcome per call.
/// - Many calls may be outstanding at once (`Send + Sync`, shared via `Arc`).
/// - `rename` is atomic: readers of `dst` see its old value or the full value
///   of `src`, never a mix.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Overwrite `key` with `value`, creating it if absent.
    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()>;

    /// Append `chunk` to `key`, creating it if absent.
    ///
    /// Returns the length of the value after the append.
    async fn append(&self, key: &str, chunk: Bytes) -> StoreResult<u64>;

    /// Atomically move `src` onto `dst`, overwriting `dst` if present.
    ///
    /// Fails with [`StoreError::NoSuchKey`](crate::StoreError::NoSuchKey)
    /// when `src` does not exist.
    async fn rename(&self, src: &str, dst: &str) -> StoreResult<()>;

    /// Read the value stored at `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Check whether `key` exists.
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Delete `key`. Returns `true` if it existed.
    async fn del(&self, key: &str) -> StoreResult<bool>;
}

/// A caller-owned queue of commands executed later as one unit.
///
/// Enqueueing is synchronous and yields no acknowledgment; the effect of a
/// queued command becomes visible only when the owner commits the batch.
pub trait CommandBatch: Send + Sync {
    /// Queue an atomic move of `src` onto `dst`.
    fn rename(&self, src: &str, dst: &str) -> StoreResult<()>;
}
