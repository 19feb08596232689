//! Chunk fetcher: one remote call per chunk index.
//!
//! Each fetch runs as its own tokio task the moment it is issued, so
//! several chunks travel concurrently while the consumer decodes earlier
//! ones. Dropping a `Chunk` detaches its task: the fetch still completes and
//! its result is discarded.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use ferry_core::{ChannelError, RemoteEntry, StreamError};
use tokio::task::JoinHandle;

use crate::host::RemoteChannel;
use crate::window::Prefetch;

/// A chunk whose fetch has been issued.
pub struct Chunk {
    index: u64,
    length: usize,
    payload: JoinHandle<Result<String, ChannelError>>,
}

/// A chunk whose transport text has arrived.
#[derive(Debug)]
pub struct FetchedBlock {
    pub index: u64,
    /// Declared length in bytes.
    pub length: usize,
    /// Base64 text as returned by the channel.
    pub encoded: String,
}

impl Chunk {
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Future for Chunk {
    type Output = Result<FetchedBlock, StreamError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let (index, length) = (self.index, self.length);
        Pin::new(&mut self.payload).poll(cx).map(|joined| match joined {
            Ok(Ok(encoded)) => Ok(FetchedBlock {
                index,
                length,
                encoded,
            }),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(ChannelError::TaskFailed(e.to_string()).into()),
        })
    }
}

impl Prefetch for Chunk {
    fn is_complete(&self) -> bool {
        self.payload.is_finished()
    }
}

/// Maps a chunk index to a running fetch of that chunk's byte range.
#[derive(Clone)]
pub struct ChunkFetcher {
    channel: Arc<dyn RemoteChannel>,
    entry: RemoteEntry,
    chunk_size: usize,
}

impl ChunkFetcher {
    pub fn new(channel: Arc<dyn RemoteChannel>, entry: RemoteEntry, chunk_size: usize) -> Self {
        Self {
            channel,
            entry,
            chunk_size,
        }
    }

    /// Total chunks for the entry.
    pub fn chunk_count(&self) -> u64 {
        self.entry.chunk_count(self.chunk_size)
    }

    /// Issue the fetch for `index`. Must be called inside a tokio runtime.
    pub fn fetch(&self, index: u64) -> Chunk {
        let (offset, length) = self.entry.chunk_span(index, self.chunk_size);
        let entry_id = self.entry.id;
        let channel = self.channel.clone();
        tracing::trace!(entry_id, index, offset, length, "chunk fetch issued");

        let payload =
            tokio::spawn(async move { channel.read_file_data(entry_id, offset, length).await });
        Chunk {
            index,
            length,
            payload,
        }
    }
}
