//! Chunked strategy: prefetch window plus block decoder.
//!
//! Decoded bytes live in one scratch buffer sized to the chunk size. A read
//! drains whatever is left of the current block, then pulls further blocks
//! only while they are already on hand: once something has been copied the
//! reader returns rather than wait on the network.

use std::sync::Arc;

use ferry_core::decode::decode_block;
use ferry_core::{RemoteEntry, StreamConfig, StreamError};
use tokio_util::sync::CancellationToken;

use crate::chunk::{Chunk, ChunkFetcher, FetchedBlock};
use crate::host::RemoteChannel;
use crate::window::{Peek, PrefetchWindow};

pub struct ChunkedReader {
    entry_id: u32,
    window: PrefetchWindow<Chunk>,
    scratch: Box<[u8]>,
    /// Decoded length of the block in `scratch`.
    block_len: usize,
    /// Bytes of that block already handed out. Never exceeds `block_len`.
    consumed: usize,
}

impl ChunkedReader {
    /// Start reading `entry`. Issues the first window of fetches right away,
    /// so this must run inside a tokio runtime.
    pub fn new(
        channel: Arc<dyn RemoteChannel>,
        entry: &RemoteEntry,
        config: &StreamConfig,
    ) -> Self {
        let chunk_size = config.maximum_message_size;
        let capacity = config.window_capacity();
        let fetcher = ChunkFetcher::new(channel, entry.clone(), chunk_size);
        let total = fetcher.chunk_count();
        tracing::debug!(
            entry_id = entry.id,
            size = entry.size,
            chunk_size,
            chunks = total,
            window = capacity,
            "chunked reader opened"
        );

        Self {
            entry_id: entry.id,
            window: PrefetchWindow::new(move |index| fetcher.fetch(index), total, capacity),
            scratch: vec![0u8; chunk_size].into_boxed_slice(),
            block_len: 0,
            consumed: 0,
        }
    }

    /// Copy up to `dest.len()` bytes. Returns 0 only when `dest` is empty.
    pub async fn copy_into(
        &mut self,
        dest: &mut [u8],
        cancel: Option<&CancellationToken>,
    ) -> Result<usize, StreamError> {
        let mut copied = 0;

        while copied < dest.len() {
            if self.consumed == self.block_len {
                if copied > 0 && self.window.try_peek_next() != Peek::Ready {
                    break;
                }
                let next = self.window.read_next(cancel).await;
                match next {
                    Ok(fetched) => self.load(fetched?)?,
                    Err(StreamError::Cancelled) if copied > 0 => break,
                    Err(e) => return Err(e),
                }
                continue;
            }

            let transferable = (self.block_len - self.consumed).min(dest.len() - copied);
            dest[copied..copied + transferable]
                .copy_from_slice(&self.scratch[self.consumed..self.consumed + transferable]);
            self.consumed += transferable;
            copied += transferable;
        }

        Ok(copied)
    }

    /// Decode a fetched block into the scratch buffer.
    fn load(&mut self, block: FetchedBlock) -> Result<(), StreamError> {
        let decoded = decode_block(&block.encoded, &mut self.scratch, 0, block.length)?;
        if decoded < block.length {
            tracing::warn!(
                entry_id = self.entry_id,
                index = block.index,
                declared = block.length,
                decoded,
                "chunk decoded short"
            );
        }
        tracing::trace!(
            entry_id = self.entry_id,
            index = block.index,
            bytes = decoded,
            "chunk decoded"
        );
        self.block_len = decoded;
        self.consumed = 0;
        Ok(())
    }

    /// Chunks currently queued or in flight.
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }
}
