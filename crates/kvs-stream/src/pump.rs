use std::io::ErrorKind;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{StreamError, StreamResult};
use crate::writer::AtomicAppendWriter;

impl AtomicAppendWriter {
    /// Stream everything `reader` yields into the session, then finish it.
    ///
    /// Data is read and appended in chunks of at most `read_chunk_size`
    /// bytes, so memory use stays bounded regardless of the source length.
    /// A read error aborts the session and is returned as
    /// [`StreamError::Io`]. Returns the number of bytes copied.
    pub async fn copy_from<R>(&mut self, mut reader: R) -> StreamResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.check_accepting()?;
        let mut buf = vec![0u8; self.read_chunk_size];
        let mut copied = 0u64;

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.fail(StreamError::from(e))),
            };
            self.write(Bytes::copy_from_slice(&buf[..n])).await?;
            copied += n as u64;
        }

        let promotion = self.finish(None).await?;
        debug!(copied, %promotion, "reader drained");
        Ok(copied)
    }
}
