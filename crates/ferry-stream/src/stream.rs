//! The forward-only read stream handed to callers.
//!
//! Owns position and length, clamps every request to what remains, fires
//! one data-read event per productive read and delegates the byte copying
//! to the strategy chosen at open time. Reads may return fewer bytes than
//! asked for; callers loop until they have what they need.

use bytes::Bytes;
use ferry_core::{Operation, RemoteEntry, StreamError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::chunked::ChunkedReader;
use crate::direct::DirectReader;
use crate::events::{DataRead, DataReadEvents};
use crate::selector::Capability;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

enum Strategy {
    Chunked(ChunkedReader),
    Direct(DirectReader),
}

pub struct FileStream {
    entry: RemoteEntry,
    position: u64,
    strategy: Strategy,
    events: DataReadEvents,
    failed: bool,
}

impl FileStream {
    pub(crate) fn chunked(entry: RemoteEntry, reader: ChunkedReader, events: DataReadEvents) -> Self {
        Self::with_strategy(entry, Strategy::Chunked(reader), events)
    }

    pub(crate) fn direct(entry: RemoteEntry, reader: DirectReader, events: DataReadEvents) -> Self {
        Self::with_strategy(entry, Strategy::Direct(reader), events)
    }

    fn with_strategy(entry: RemoteEntry, strategy: Strategy, events: DataReadEvents) -> Self {
        Self {
            entry,
            position: 0,
            strategy,
            events,
            failed: false,
        }
    }

    // ── Properties ────────────────────────────────────────────────────────────

    pub fn entry(&self) -> &RemoteEntry {
        &self.entry
    }

    pub fn length(&self) -> u64 {
        self.entry.size
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn remaining(&self) -> u64 {
        self.length() - self.position
    }

    pub fn can_read(&self) -> bool {
        true
    }

    pub fn can_seek(&self) -> bool {
        false
    }

    pub fn can_write(&self) -> bool {
        false
    }

    /// True once a read failed fatally.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn capability(&self) -> Capability {
        match self.strategy {
            Strategy::Chunked(_) => Capability::Chunked,
            Strategy::Direct(_) => Capability::DirectMemory,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataRead> {
        self.events.subscribe()
    }

    // ── Unsupported ───────────────────────────────────────────────────────────

    pub fn set_position(&mut self, _position: u64) -> Result<(), StreamError> {
        Err(StreamError::Unsupported(Operation::SetPosition))
    }

    pub fn seek(&mut self, _position: std::io::SeekFrom) -> Result<u64, StreamError> {
        Err(StreamError::Unsupported(Operation::Seek))
    }

    pub fn write(&mut self, _buf: &[u8]) -> Result<usize, StreamError> {
        Err(StreamError::Unsupported(Operation::Write))
    }

    pub fn flush(&mut self) -> Result<(), StreamError> {
        Err(StreamError::Unsupported(Operation::Flush))
    }

    pub fn set_length(&mut self, _length: u64) -> Result<(), StreamError> {
        Err(StreamError::Unsupported(Operation::SetLength))
    }

    // ── Reading ───────────────────────────────────────────────────────────────

    /// Read into `buf`. Returns 0 only at end of stream or for an empty
    /// buffer.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let len = buf.len();
        self.read_into(buf, 0, len, None).await
    }

    pub async fn read_cancellable(
        &mut self,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize, StreamError> {
        let len = buf.len();
        self.read_into(buf, 0, len, Some(cancel)).await
    }

    /// Read up to `max_count` bytes into `buf[offset..]`.
    pub async fn read_into(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        max_count: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<usize, StreamError> {
        if self.failed {
            return Err(StreamError::Failed);
        }
        let in_bounds = offset
            .checked_add(max_count)
            .is_some_and(|end| end <= buf.len());
        if !in_bounds {
            return Err(StreamError::OutOfBounds {
                offset,
                count: max_count,
                len: buf.len(),
            });
        }

        let wanted = (max_count as u64).min(self.remaining()) as usize;
        if wanted == 0 {
            return Ok(0);
        }

        let result = match &mut self.strategy {
            Strategy::Chunked(reader) => {
                reader
                    .copy_into(&mut buf[offset..offset + wanted], cancel)
                    .await
            }
            Strategy::Direct(reader) => {
                reader
                    .copy_into(self.position, buf, offset, wanted, cancel)
                    .await
            }
        };

        match result {
            Ok(read) => {
                self.position += read as u64;
                self.events.notify(DataRead {
                    entry_id: self.entry.id,
                    bytes_read: read,
                    position: self.position,
                    length: self.length(),
                });
                tracing::trace!(
                    entry_id = self.entry.id,
                    bytes = read,
                    position = self.position,
                    "read"
                );
                Ok(read)
            }
            Err(e) => {
                if e.is_fatal() {
                    self.failed = true;
                    tracing::warn!(
                        entry_id = self.entry.id,
                        position = self.position,
                        error = %e,
                        "stream failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Read everything from the current position into memory.
    ///
    /// Refuses entries larger than `limit` before reading anything.
    pub async fn read_all(&mut self, limit: u64) -> Result<Bytes, StreamError> {
        if self.length() > limit {
            return Err(StreamError::TooLarge {
                limit,
                size: self.length(),
            });
        }

        let mut out = vec![0u8; self.remaining() as usize];
        let mut filled = 0;
        while filled < out.len() {
            filled += self.read(&mut out[filled..]).await?;
        }
        Ok(Bytes::from(out))
    }

    /// Pump the rest of the stream into `writer`. Returns the bytes copied.
    pub async fn copy_to<W>(&mut self, writer: &mut W) -> Result<u64, StreamError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            total += n as u64;
        }
        writer.flush().await?;
        Ok(total)
    }
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream")
            .field("entry_id", &self.entry.id)
            .field("position", &self.position)
            .field("length", &self.length())
            .field("capability", &self.capability())
            .field("failed", &self.failed)
            .finish()
    }
}
