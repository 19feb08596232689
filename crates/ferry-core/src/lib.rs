//! ferry-core — shared types, configuration, errors and the block decoder.
//! The streaming crate and the CLI both depend on this one.

pub mod config;
pub mod decode;
pub mod entry;
pub mod error;
pub mod size;

pub use config::{FerryConfig, StreamConfig, TransferMode};
pub use entry::RemoteEntry;
pub use error::{ChannelError, Operation, StreamError};
