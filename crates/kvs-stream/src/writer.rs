//! The atomic append-stream writer.
//!
//! A session stages every chunk under a private key and only moves that key
//! onto the public one after the last append is acknowledged. Readers of the
//! public key therefore see either its previous value or the complete new
//! one, never a prefix.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kvs_store::{CommandBatch, KvStore};

use crate::chunk::Chunk;
use crate::config::WriterConfig;
use crate::error::{StoreOp, StreamError, StreamResult};
use crate::sink::ChunkSink;
use crate::staging::StagingKey;
use crate::state::{Promotion, SessionEvent, SessionState, SessionStats};

/// Builder for an [`AtomicAppendWriter`].
///
/// Client and key are optional here so that their absence is reported as
/// [`StreamError::InvalidArgument`] by [`open`](Self::open).
#[derive(Default)]
pub struct WriterBuilder {
    client: Option<Arc<dyn KvStore>>,
    key: Option<String>,
    config: WriterConfig,
    batch: Option<Arc<dyn CommandBatch>>,
}

impl WriterBuilder {
    pub fn client(mut self, client: Arc<dyn KvStore>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Stage under `key + suffix` instead of a random key.
    pub fn staging_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.staging_key_suffix = Some(suffix.into());
        self
    }

    /// Enqueue the promotion into `batch` instead of executing it.
    pub fn batch(mut self, batch: Arc<dyn CommandBatch>) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Validate the arguments and start the session.
    ///
    /// Dispatches the staging key truncation on the current tokio runtime and
    /// returns without waiting for it. Argument errors are returned here and
    /// no store call is made; a truncation failure is reported by the first
    /// later operation and on the event channel.
    pub fn open(self) -> StreamResult<AtomicAppendWriter> {
        let client = self
            .client
            .ok_or_else(|| StreamError::InvalidArgument("a store client is required".into()))?;
        let public_key = self
            .key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| StreamError::InvalidArgument("a non-empty key is required".into()))?;
        self.config.validate()?;
        let runtime = Handle::try_current().map_err(|_| {
            StreamError::InvalidArgument("writer must be opened inside a tokio runtime".into())
        })?;

        let staging_key =
            StagingKey::derive(&public_key, self.config.staging_key_suffix.as_deref());
        let (events, first_subscriber) = broadcast::channel(self.config.event_capacity);
        let latch = SessionLatch::new(events.clone());

        let truncation = runtime.spawn(truncate(
            Arc::clone(&client),
            staging_key.clone(),
            latch.clone(),
        ));

        info!(
            public_key = %public_key,
            staging_key = %staging_key,
            batched = self.batch.is_some(),
            "append stream opened"
        );

        Ok(AtomicAppendWriter {
            store: client,
            batch: self.batch,
            public_key,
            staging_key,
            state: SessionState::Initializing,
            pending_writes: 0,
            truncation: Some(truncation),
            stats: SessionStats::default(),
            latch,
            events,
            first_subscriber: Some(first_subscriber),
            read_chunk_size: self.config.read_chunk_size,
        })
    }
}

#[derive(Default)]
struct LatchState {
    truncated: bool,
    failure: Option<StreamError>,
}

/// Truncation and failure outcomes shared between a writer and its
/// truncation task.
///
/// Both sides broadcast `Ready` and `Failed` only through here, under one
/// lock: the first recorded failure wins and is sent once, and `Ready` is
/// never sent after it.
#[derive(Clone)]
struct SessionLatch {
    state: Arc<Mutex<LatchState>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionLatch {
    fn new(events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LatchState::default())),
            events,
        }
    }

    fn mark_truncated(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.failure.is_none() {
            state.truncated = true;
            // No receivers is fine.
            let _ = self.events.send(SessionEvent::Ready);
        }
    }

    /// Record `err` unless the session already failed, and return the
    /// failure that stands.
    fn fail(&self, err: StreamError) -> StreamError {
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(first) = &state.failure {
            return first.clone();
        }
        let _ = self.events.send(SessionEvent::Failed(err.clone()));
        state.failure = Some(err.clone());
        err
    }

    fn failure(&self) -> Option<StreamError> {
        self.state.lock().expect("lock poisoned").failure.clone()
    }

    fn is_truncated(&self) -> bool {
        self.state.lock().expect("lock poisoned").truncated
    }
}

/// Empty the staging key so no residue of an earlier session survives.
async fn truncate(
    store: Arc<dyn KvStore>,
    staging_key: StagingKey,
    latch: SessionLatch,
) -> StreamResult<()> {
    match store.set(staging_key.as_str(), Bytes::new()).await {
        Ok(()) => {
            latch.mark_truncated();
            Ok(())
        }
        Err(e) => {
            let err = StreamError::store(StoreOp::Truncate, staging_key.as_str(), e);
            warn!(error = %err, "staging key truncation failed");
            Err(latch.fail(err))
        }
    }
}

/// Streams chunks into one key of a [`KvStore`] and publishes them atomically.
///
/// Every `write` awaits the store's acknowledgment of its append before
/// returning, so at most one append per session is ever outstanding and
/// appends land in submission order. [`finish`](Self::finish) promotes the
/// staging key with a rename, either directly or through the caller's batch.
///
/// The staging key is never deleted by the writer, even after a failure.
pub struct AtomicAppendWriter {
    store: Arc<dyn KvStore>,
    batch: Option<Arc<dyn CommandBatch>>,
    public_key: String,
    staging_key: StagingKey,
    state: SessionState,
    pending_writes: usize,
    /// Outstanding truncation; `None` once its outcome has been observed.
    truncation: Option<JoinHandle<StreamResult<()>>>,
    stats: SessionStats,
    latch: SessionLatch,
    events: broadcast::Sender<SessionEvent>,
    /// Receiver created with the channel, so the first subscriber also sees
    /// events sent before it subscribed.
    first_subscriber: Option<broadcast::Receiver<SessionEvent>>,
    pub(crate) read_chunk_size: usize,
}

impl AtomicAppendWriter {
    pub fn builder() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Open a session on `key` with default configuration.
    pub fn open(client: Arc<dyn KvStore>, key: impl Into<String>) -> StreamResult<Self> {
        Self::builder().client(client).key(key).open()
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn staging_key(&self) -> &StagingKey {
        &self.staging_key
    }

    /// Current state, including a truncation outcome the writer has not
    /// acted on yet.
    pub fn state(&self) -> SessionState {
        if self.state.is_terminal() {
            self.state
        } else if self.latch.failure().is_some() {
            SessionState::Errored
        } else if self.state == SessionState::Initializing && self.latch.is_truncated() {
            SessionState::Ready
        } else {
            self.state
        }
    }

    /// The first error that moved the session to `Errored`, if any.
    pub fn error(&self) -> Option<StreamError> {
        self.latch.failure()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Appends issued but not yet acknowledged.
    pub fn pending_writes(&self) -> usize {
        self.pending_writes
    }

    pub fn is_batched(&self) -> bool {
        self.batch.is_some()
    }

    /// Subscribe to session events.
    ///
    /// The first call returns a receiver that has buffered every event since
    /// the session opened; later calls only see events sent afterwards.
    pub fn subscribe(&mut self) -> broadcast::Receiver<SessionEvent> {
        self.first_subscriber
            .take()
            .unwrap_or_else(|| self.events.subscribe())
    }

    /// Wait for the staging key truncation to be acknowledged.
    pub async fn ready(&mut self) -> StreamResult<()> {
        self.check_accepting()?;
        self.settle_truncation().await
    }

    /// Append one chunk to the staging key.
    ///
    /// Resolves once the store has acknowledged the append. A failure moves
    /// the session to `Errored`; the public key is left untouched.
    pub async fn write(&mut self, chunk: impl Into<Chunk>) -> StreamResult<()> {
        self.check_accepting()?;
        let bytes = match chunk.into().into_bytes() {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(e)),
        };
        self.settle_truncation().await?;
        self.append(bytes).await
    }

    /// Write an optional last chunk, then promote the staging key.
    ///
    /// Without a batch the rename is executed and awaited. With a batch it is
    /// only enqueued, and the public key changes when the caller commits it.
    pub async fn finish(&mut self, last: Option<Chunk>) -> StreamResult<Promotion> {
        self.check_accepting()?;
        if let Some(chunk) = last {
            self.write(chunk).await?;
        }
        self.settle_truncation().await?;
        debug_assert_eq!(self.pending_writes, 0);

        self.transition(SessionState::Finishing);
        let staging = self.staging_key.as_str();
        let promoted = match &self.batch {
            None => self
                .store
                .rename(staging, &self.public_key)
                .await
                .map(|()| Promotion::Renamed)
                .map_err(|e| StreamError::store(StoreOp::Rename, staging, e)),
            Some(batch) => batch
                .rename(staging, &self.public_key)
                .map(|()| Promotion::Enqueued)
                .map_err(|e| StreamError::store(StoreOp::EnqueueRename, staging, e)),
        };

        match promoted {
            Ok(promotion) => {
                self.transition(SessionState::Closed);
                info!(
                    public_key = %self.public_key,
                    %promotion,
                    chunks = self.stats.chunks,
                    bytes = self.stats.bytes,
                    "append stream finished"
                );
                let _ = self.events.send(SessionEvent::Finished(promotion));
                Ok(promotion)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Finish without a last chunk.
    pub async fn close(&mut self) -> StreamResult<Promotion> {
        self.finish(None).await
    }

    /// Abandon the session. No further store calls are issued and the
    /// staging key is left as it is.
    pub fn abort(&mut self, reason: impl Into<String>) -> StreamResult<()> {
        self.sync_latch();
        if self.state.is_terminal() {
            return Err(StreamError::InvalidState { state: self.state });
        }
        if let Some(handle) = self.truncation.take() {
            handle.abort();
        }
        self.fail(StreamError::Aborted(reason.into()));
        Ok(())
    }

    async fn append(&mut self, bytes: Bytes) -> StreamResult<()> {
        let len = bytes.len();
        self.transition(SessionState::Writing);
        self.pending_writes += 1;

        let result = self.store.append(self.staging_key.as_str(), bytes).await;
        self.pending_writes -= 1;

        match result {
            Ok(total) => {
                self.stats.chunks += 1;
                self.stats.bytes += len as u64;
                debug!(staging_key = %self.staging_key, len, total, "chunk appended");
                let _ = self.events.send(SessionEvent::Appended { len, total });
                Ok(())
            }
            Err(e) => {
                let err = StreamError::store(StoreOp::Append, self.staging_key.as_str(), e);
                Err(self.fail(err))
            }
        }
    }

    /// Observe the truncation outcome, waiting for it if needed.
    ///
    /// The handle is only cleared after it resolves, so a cancelled caller
    /// leaves it in place for the next operation.
    async fn settle_truncation(&mut self) -> StreamResult<()> {
        let Some(handle) = self.truncation.as_mut() else {
            return Ok(());
        };
        let joined = handle.await;
        self.truncation = None;

        match joined {
            Ok(Ok(())) => {
                self.sync_latch();
                Ok(())
            }
            Ok(Err(err)) => {
                // Recorded and broadcast by the truncation task.
                self.sync_latch();
                Err(err)
            }
            Err(join) => Err(self.fail(StreamError::Aborted(format!(
                "truncation task did not complete: {join}"
            )))),
        }
    }

    /// Reject operations on finished sessions and detect cancelled ones.
    pub(crate) fn check_accepting(&mut self) -> StreamResult<()> {
        self.sync_latch();
        match self.state {
            SessionState::Closed | SessionState::Errored => {
                Err(StreamError::InvalidState { state: self.state })
            }
            // Only observable when a `finish` future was dropped mid-promotion.
            SessionState::Finishing => Err(self.fail(StreamError::Aborted(
                "finish was cancelled during promotion".into(),
            ))),
            _ if self.pending_writes > 0 => Err(self.fail(StreamError::Aborted(
                "a write was cancelled before its append was acknowledged".into(),
            ))),
            _ => Ok(()),
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid session transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Apply outcomes the truncation task recorded on its own.
    fn sync_latch(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if self.latch.failure().is_some() {
            self.transition(SessionState::Errored);
            self.truncation = None;
        } else if self.state == SessionState::Initializing && self.latch.is_truncated() {
            self.transition(SessionState::Ready);
            self.truncation = None;
        }
    }

    /// Move to `Errored` and hand back the failure that stands.
    ///
    /// If the session already failed (possibly inside the truncation task),
    /// that first error is kept and nothing new is broadcast.
    pub(crate) fn fail(&mut self, err: StreamError) -> StreamError {
        let err = self.latch.fail(err);
        warn!(
            public_key = %self.public_key,
            staging_key = %self.staging_key,
            error = %err,
            "append stream failed"
        );
        if !self.state.is_terminal() {
            self.transition(SessionState::Errored);
        }
        err
    }
}

#[async_trait]
impl ChunkSink for AtomicAppendWriter {
    async fn write(&mut self, chunk: Chunk) -> StreamResult<()> {
        AtomicAppendWriter::write(self, chunk).await
    }

    async fn finish(&mut self, last: Option<Chunk>) -> StreamResult<Promotion> {
        AtomicAppendWriter::finish(self, last).await
    }
}

impl std::fmt::Debug for AtomicAppendWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicAppendWriter")
            .field("public_key", &self.public_key)
            .field("staging_key", &self.staging_key)
            .field("state", &self.state)
            .field("batched", &self.batch.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
