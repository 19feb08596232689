//! ferry integration test harness.
//!
//! Every test drives streams end to end against the loopback host or a
//! purpose-built channel; nothing here needs a browser or the network.
//!
//!   cargo test --test integration

use std::sync::Arc;

use anyhow::{Context, Result};
use ferry_core::{StreamConfig, TransferMode};
use ferry_stream::{FileEntry, FileInput, FileStream, MemoryHost};

mod chunked;
mod direct;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const ELEMENT_ID: &str = "file-input";

/// Deterministic, non-repeating-per-chunk test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

pub fn config(message: usize, buffer: usize, mode: TransferMode) -> StreamConfig {
    StreamConfig {
        maximum_message_size: message,
        maximum_buffer_size: buffer,
        transfer_mode: mode,
        ..StreamConfig::default()
    }
}

/// Select `data` on `memory` and return an input plus the matching entry.
pub fn select(
    memory: &Arc<MemoryHost>,
    data: Vec<u8>,
    config: StreamConfig,
    direct: bool,
) -> Result<(FileInput, FileEntry)> {
    memory.select("payload.bin", "application/octet-stream", data);
    let input = FileInput::new(memory.host(ELEMENT_ID, direct), config)?;
    let entry = input
        .entries_from_notification(&memory.notification())?
        .pop()
        .context("no entries in notification")?;
    Ok((input, entry))
}

/// Read to the end with reads of at most `read_size` bytes.
pub async fn drain(stream: &mut FileStream, read_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(stream.remaining() as usize);
    let mut buf = vec![0u8; read_size];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}
