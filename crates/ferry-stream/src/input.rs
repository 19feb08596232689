//! The consumer-side view of a host's current selection.

use bytes::Bytes;
use ferry_core::config::ConfigError;
use ferry_core::{ChannelError, RemoteEntry, StreamConfig, StreamError};
use tokio::sync::broadcast;

use crate::events::{DataRead, DataReadEvents};
use crate::host::Host;
use crate::selector::{Capability, CapabilitySelector};
use crate::stream::FileStream;

#[derive(Debug)]
pub struct FileInput {
    selector: CapabilitySelector,
    config: StreamConfig,
}

impl FileInput {
    pub fn new(host: Host, config: StreamConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            selector: CapabilitySelector::new(host),
            config,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn selector(&self) -> &CapabilitySelector {
        &self.selector
    }

    /// Strategy new streams will use.
    pub fn capability(&self) -> Result<Capability, StreamError> {
        self.selector.select(self.config.transfer_mode)
    }

    /// Turn a host change notification into entries.
    pub fn entries_from_notification(&self, json: &str) -> Result<Vec<FileEntry>, ChannelError> {
        let entries = RemoteEntry::list_from_json(json)
            .map_err(|e| ChannelError::Protocol(format!("malformed change notification: {e}")))?;
        tracing::debug!(
            element_id = %self.selector.host().element_id(),
            count = entries.len(),
            "selection changed"
        );
        Ok(entries.into_iter().map(FileEntry::new).collect())
    }

    /// Open a fresh stream for `entry`, sharing the entry's event channel.
    pub fn open_stream(&self, entry: &FileEntry) -> Result<FileStream, StreamError> {
        self.selector
            .open(&entry.meta, &self.config, entry.events.clone())
    }
}

/// One selected file plus its lazily opened stream.
#[derive(Debug)]
pub struct FileEntry {
    meta: RemoteEntry,
    events: DataReadEvents,
    stream: Option<FileStream>,
}

impl FileEntry {
    pub fn new(meta: RemoteEntry) -> Self {
        Self {
            meta,
            events: DataReadEvents::default(),
            stream: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn size(&self) -> u64 {
        self.meta.size
    }

    pub fn content_type(&self) -> &str {
        &self.meta.content_type
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.meta.last_modified.as_deref()
    }

    pub fn meta(&self) -> &RemoteEntry {
        &self.meta
    }

    /// Data-read events of every stream opened for this entry.
    pub fn subscribe(&self) -> broadcast::Receiver<DataRead> {
        self.events.subscribe()
    }

    /// The entry's stream, opened on first use.
    pub fn data(&mut self, input: &FileInput) -> Result<&mut FileStream, StreamError> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => input.open_stream(self)?,
        };
        Ok(self.stream.insert(stream))
    }

    /// Read the whole entry, refusing anything over the configured limit.
    pub async fn read_all(&mut self, input: &FileInput) -> Result<Bytes, StreamError> {
        let limit = input.config().read_all_limit;
        if self.meta.size > limit {
            return Err(StreamError::TooLarge {
                limit,
                size: self.meta.size,
            });
        }
        self.data(input)?.read_all(limit).await
    }
}
