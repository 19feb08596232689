//! ferry-stream — forward-only streams over payloads held by a host.
//!
//! Two strategies sit behind one `FileStream`:
//!   - chunked: base64 chunks fetched over the host channel, several kept in
//!     flight ahead of the reader
//!   - direct: one synchronous host copy per read, when the host offers it
//!
//! `FileInput` ties a host and a config together and opens streams for the
//! entries of a selection.

mod cancel;
pub mod chunk;
pub mod chunked;
pub mod direct;
pub mod events;
pub mod host;
pub mod input;
pub mod memory;
pub mod selector;
pub mod stream;
pub mod window;

pub use events::{DataRead, DataReadEvents};
pub use host::{DirectMemory, Host, ReadRequest, RemoteChannel};
pub use input::{FileEntry, FileInput};
pub use memory::{HostStats, MemoryHost};
pub use selector::{Capability, CapabilitySelector};
pub use stream::FileStream;
pub use window::{Peek, Prefetch, PrefetchWindow};
