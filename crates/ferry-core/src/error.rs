//! Error taxonomy for stream reads and the host channel.
//!
//! Nothing here is retried. A fetch or decode failure surfaces from the
//! read call that triggered it; retry policy belongs to whoever owns the
//! remote channel.

use std::fmt;

use crate::config::ConfigError;

/// Operations a forward-only read stream refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Seek,
    Write,
    Flush,
    SetLength,
    SetPosition,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Seek => "seek",
            Operation::Write => "write",
            Operation::Flush => "flush",
            Operation::SetLength => "set length",
            Operation::SetPosition => "set position",
        };
        f.write_str(name)
    }
}

/// Failures reported by the host side: the remote fetch channel or the
/// direct-memory capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("there is no entry with id {0}; the selection may have changed")]
    UnknownEntry(u32),
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("host unavailable: {0}")]
    Unavailable(String),
    #[error("fetch task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("{0} is not supported on a forward-only read stream")]
    Unsupported(Operation),

    /// A block decoded to more bytes than it was allowed to hold.
    #[error("requested a maximum of {max} bytes, but the block decodes to {actual}")]
    DecodeOverflow { max: usize, actual: usize },

    #[error("failed to decode base64 block: {0}")]
    InvalidEncoding(String),

    /// A chunk was requested when none remain and none are in flight.
    #[error("there are no more chunks to read")]
    Exhausted,

    #[error("read cancelled")]
    Cancelled,

    #[error("host does not provide direct memory access")]
    CapabilityMissing,

    /// Open-time only; the stream was never created.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("range {offset}+{count} is outside a buffer of {len} bytes")]
    OutOfBounds {
        offset: usize,
        count: usize,
        len: usize,
    },

    #[error("the maximum allowed size is {limit}, but the entry is {size} bytes")]
    TooLarge { limit: u64, size: u64 },

    /// Writing to a copy destination failed.
    #[error("copy destination failed: {0}")]
    Io(#[from] std::io::Error),

    /// An earlier read failed fatally; the stream cannot continue.
    #[error("stream failed on an earlier read")]
    Failed,
}

impl StreamError {
    /// Cancellation is a caller decision, not a failure of the stream.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }

    /// Whether this error leaves the stream unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StreamError::DecodeOverflow { .. }
                | StreamError::InvalidEncoding(_)
                | StreamError::Exhausted
                | StreamError::Channel(_)
                | StreamError::Failed
        )
    }
}
