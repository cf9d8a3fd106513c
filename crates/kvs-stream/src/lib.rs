//! Atomic append-stream writer for key-value stores.
//!
//! An [`AtomicAppendWriter`] lets a producer push an unbounded sequence of
//! chunks into one key of a [`KvStore`](kvs_store::KvStore) without ever
//! exposing a partial value to readers of that key.
//!
//! # Protocol
//!
//! 1. On open, truncate a private staging key (`set(staging, "")`).
//! 2. For each chunk, `append(staging, chunk)` and wait for the ack.
//! 3. On finish, `rename(staging, public)`, or enqueue that rename into a
//!    caller-owned [`CommandBatch`](kvs_store::CommandBatch).
//!
//! # Guarantees
//!
//! - At most one append is outstanding per session; appends land in order.
//! - No rename is issued unless every append succeeded.
//! - Failed sessions leave the public key untouched and the staging key in
//!   place for inspection. Nothing is retried.

pub mod chunk;
pub mod config;
pub mod error;
mod pump;
pub mod sink;
pub mod staging;
pub mod state;
pub mod writer;

#[cfg(test)]
mod testing;

pub use chunk::{Chunk, Encoding};
pub use config::WriterConfig;
pub use error::{StoreOp, StreamError, StreamResult};
pub use sink::ChunkSink;
pub use staging::StagingKey;
pub use state::{Promotion, SessionEvent, SessionState, SessionStats};
pub use writer::{AtomicAppendWriter, WriterBuilder};
