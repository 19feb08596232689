//! Picks the transfer strategy when a stream opens.
//!
//! Whether the host offers direct memory is resolved once per selector and
//! cached. A stream keeps the strategy it was opened with; there is no
//! fallback halfway through a read.

use std::fmt;
use std::sync::OnceLock;

use ferry_core::{RemoteEntry, StreamConfig, StreamError, TransferMode};

use crate::chunked::ChunkedReader;
use crate::direct::DirectReader;
use crate::events::DataReadEvents;
use crate::host::Host;
use crate::stream::FileStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    DirectMemory,
    Chunked,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::DirectMemory => f.write_str("direct"),
            Capability::Chunked => f.write_str("chunked"),
        }
    }
}

#[derive(Debug)]
pub struct CapabilitySelector {
    host: Host,
    direct_memory: OnceLock<bool>,
}

impl CapabilitySelector {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            direct_memory: OnceLock::new(),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn supports_direct_memory(&self) -> bool {
        *self.direct_memory.get_or_init(|| {
            let supported = self.host.direct_memory().is_some();
            tracing::debug!(
                element_id = %self.host.element_id(),
                supported,
                "direct memory resolved"
            );
            supported
        })
    }

    /// The cached capability check, if it has run.
    pub fn resolved(&self) -> Option<bool> {
        self.direct_memory.get().copied()
    }

    pub fn select(&self, mode: TransferMode) -> Result<Capability, StreamError> {
        match mode {
            TransferMode::Chunked => Ok(Capability::Chunked),
            TransferMode::Auto if self.supports_direct_memory() => Ok(Capability::DirectMemory),
            TransferMode::Auto => Ok(Capability::Chunked),
            TransferMode::Direct if self.supports_direct_memory() => Ok(Capability::DirectMemory),
            TransferMode::Direct => Err(StreamError::CapabilityMissing),
        }
    }

    /// Open a stream over `entry` with the strategy `config` asks for.
    ///
    /// The chunked strategy starts fetching immediately, so this must run
    /// inside a tokio runtime.
    pub fn open(
        &self,
        entry: &RemoteEntry,
        config: &StreamConfig,
        events: DataReadEvents,
    ) -> Result<FileStream, StreamError> {
        config.validate()?;
        let capability = self.select(config.transfer_mode)?;
        tracing::debug!(entry_id = entry.id, %capability, "opening stream");

        match capability {
            Capability::DirectMemory => {
                let direct = self
                    .host
                    .direct_memory()
                    .cloned()
                    .ok_or(StreamError::CapabilityMissing)?;
                let reader = DirectReader::new(direct, self.host.element_id().clone(), entry.id);
                Ok(FileStream::direct(entry.clone(), reader, events))
            }
            Capability::Chunked => {
                let reader = ChunkedReader::new(self.host.channel().clone(), entry, config);
                Ok(FileStream::chunked(entry.clone(), reader, events))
            }
        }
    }
}
