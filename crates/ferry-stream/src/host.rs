//! What the environment holding the payload must provide.
//!
//! Every host offers the remote fetch channel. Some hosts can also copy
//! bytes straight into a caller buffer; that capability is injected as an
//! optional trait object rather than discovered by inspecting the runtime.

use std::sync::Arc;

use async_trait::async_trait;
use ferry_core::ChannelError;

/// Asynchronous, message-size-limited request/response channel.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Base64 of `count` bytes of entry `entry_id` starting at `source_offset`.
    ///
    /// The text covers exactly `count` bytes unless the range runs past the
    /// end of the payload.
    async fn read_file_data(
        &self,
        entry_id: u32,
        source_offset: u64,
        count: usize,
    ) -> Result<String, ChannelError>;
}

/// One pull through the direct-memory capability.
///
/// Borrowed for the duration of the call only.
#[derive(Debug)]
pub struct ReadRequest<'a> {
    /// Identity of the host element that owns the selection.
    pub element_id: &'a str,
    pub entry_id: u32,
    pub source_offset: u64,
    pub destination: &'a mut [u8],
    pub destination_offset: usize,
    pub maximum_bytes: usize,
}

/// In-process direct memory access to payloads held by the host.
#[async_trait]
pub trait DirectMemory: Send + Sync {
    /// Make the whole payload resident and addressable. Idempotent.
    async fn ensure_resident(&self, entry_id: u32) -> Result<(), ChannelError>;

    /// Copy up to `maximum_bytes` into `destination[destination_offset..]`.
    /// Returns the number of bytes transferred.
    fn read_shared(&self, request: ReadRequest<'_>) -> Result<usize, ChannelError>;
}

/// Handle to the host environment, cloned into every stream it opens.
#[derive(Clone)]
pub struct Host {
    element_id: Arc<str>,
    channel: Arc<dyn RemoteChannel>,
    direct: Option<Arc<dyn DirectMemory>>,
}

impl Host {
    /// A host that only offers the remote channel.
    pub fn new(element_id: impl Into<Arc<str>>, channel: Arc<dyn RemoteChannel>) -> Self {
        Self {
            element_id: element_id.into(),
            channel,
            direct: None,
        }
    }

    /// Attach the direct-memory capability.
    pub fn with_direct_memory(mut self, direct: Arc<dyn DirectMemory>) -> Self {
        self.direct = Some(direct);
        self
    }

    pub fn element_id(&self) -> &Arc<str> {
        &self.element_id
    }

    pub fn channel(&self) -> &Arc<dyn RemoteChannel> {
        &self.channel
    }

    pub fn direct_memory(&self) -> Option<&Arc<dyn DirectMemory>> {
        self.direct.as_ref()
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("element_id", &self.element_id)
            .field("direct_memory", &self.direct.is_some())
            .finish()
    }
}
