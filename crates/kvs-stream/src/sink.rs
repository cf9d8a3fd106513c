use async_trait::async_trait;

use crate::chunk::Chunk;
use crate::error::StreamResult;
use crate::state::Promotion;

/// Producer-facing sink for an ordered sequence of chunks.
///
/// `write` resolves only once the chunk has been accepted downstream, so a
/// producer that awaits each call never has more than one chunk in flight.
#[async_trait]
pub trait ChunkSink: Send {
    /// Submit the next chunk.
    async fn write(&mut self, chunk: Chunk) -> StreamResult<()>;

    /// Signal end of data, optionally with one last chunk.
    async fn finish(&mut self, last: Option<Chunk>) -> StreamResult<Promotion>;

    /// Write every chunk in order, then finish.
    async fn write_all<I>(&mut self, chunks: I) -> StreamResult<Promotion>
    where
        I: IntoIterator<Item = Chunk> + Send,
        I::IntoIter: Send,
    {
        for chunk in chunks {
            self.write(chunk).await?;
        }
        self.finish(None).await
    }
}
