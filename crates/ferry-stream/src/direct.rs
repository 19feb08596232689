//! Direct-memory strategy. One host call per read, nothing to decode.

use std::sync::Arc;

use ferry_core::{ChannelError, StreamError};
use tokio_util::sync::CancellationToken;

use crate::cancel::cancellable;
use crate::host::{DirectMemory, ReadRequest};

pub struct DirectReader {
    direct: Arc<dyn DirectMemory>,
    element_id: Arc<str>,
    entry_id: u32,
    /// Set once the host confirmed residency.
    resident: bool,
}

impl DirectReader {
    pub fn new(direct: Arc<dyn DirectMemory>, element_id: Arc<str>, entry_id: u32) -> Self {
        Self {
            direct,
            element_id,
            entry_id,
            resident: false,
        }
    }

    /// Copy `count` bytes from `source_offset` into `buf[offset..]`.
    ///
    /// `count` must be non-zero and no larger than what remains of the
    /// payload; the caller clamps it.
    pub async fn copy_into(
        &mut self,
        source_offset: u64,
        buf: &mut [u8],
        offset: usize,
        count: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<usize, StreamError> {
        if !self.resident {
            cancellable(self.direct.ensure_resident(self.entry_id), cancel).await??;
            self.resident = true;
            tracing::debug!(entry_id = self.entry_id, "payload resident");
        }

        let copied = self.direct.read_shared(ReadRequest {
            element_id: &self.element_id,
            entry_id: self.entry_id,
            source_offset,
            destination: buf,
            destination_offset: offset,
            maximum_bytes: count,
        })?;

        if copied > count {
            return Err(ChannelError::Protocol(format!(
                "host copied {copied} bytes, {count} were requested"
            ))
            .into());
        }
        if copied == 0 {
            return Err(ChannelError::Protocol(format!(
                "host copied nothing at offset {source_offset} with {count} bytes remaining"
            ))
            .into());
        }
        Ok(copied)
    }
}
