//! Key-value store capability consumed by the kvstream writer.
//!
//! The writer never speaks a wire protocol itself. It drives whatever client
//! is injected behind the [`KvStore`] trait, and optionally enqueues its final
//! promotion into a caller-owned [`CommandBatch`].
//!
//! # Primitives
//!
//! - `set` -- unconditional overwrite
//! - `append` -- create-if-absent append, returns the new length
//! - `rename` -- atomic move, overwriting the destination
//!
//! # Backends
//!
//! - [`InMemoryKvStore`] -- `HashMap`-based store for tests and embedding,
//!   with a MULTI/EXEC style [`InMemoryBatch`]
//!
//! # Design Rules
//!
//! 1. Every call resolves or fails on its own; no retries at this layer.
//! 2. Implementations must tolerate concurrent outstanding calls.
//! 3. Batched commands have no individual acknowledgment; they take effect
//!    only when the owner executes the batch.

pub mod command;
pub mod error;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use command::{Command, Reply};
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryBatch, InMemoryKvStore};
pub use traits::{CommandBatch, KvStore};
